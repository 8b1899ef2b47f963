//! Engine configuration.
//!
//! Loaded from a single JSON file in deployments; tests use
//! `MarketConfig::default_test()`.

use crate::types::AccountId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Required suffix of a submitted credential identifier.
    pub credential_domain: String,
    /// Minimum withdrawal amount, in currency units.
    pub min_withdrawal: f64,
    /// Flat reward credited to the referrer per registered referral.
    pub referral_reward: f64,
    /// Lifetime earnings needed before referral info is surfaced.
    pub referral_unlock_threshold: f64,
    /// Exact digit count required of a payout account number.
    pub payout_number_len: usize,
    /// Payout methods offered during the bind workflow.
    pub payout_methods: Vec<String>,
    /// Length of generated referral codes (A-Z and digits).
    pub referral_code_len: usize,
    /// Row cap for operator triage listings.
    pub pending_list_limit: usize,
    /// Identities allowed to invoke operator commands. The first entry
    /// receives review/withdrawal notifications.
    pub operators: Vec<AccountId>,
}

impl MarketConfig {
    /// Load from a JSON config file.
    /// In tests, use MarketConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: MarketConfig = serde_json::from_str(&content)?;
        if config.operators.is_empty() {
            anyhow::bail!("Config must name at least one operator");
        }
        Ok(config)
    }

    /// Config with hardcoded domain defaults for use in tests.
    pub fn default_test() -> Self {
        Self {
            credential_domain: "@gmail.com".into(),
            min_withdrawal: 10.0,
            referral_reward: 0.50,
            referral_unlock_threshold: 100.0,
            payout_number_len: 11,
            payout_methods: vec!["GCash".into(), "PayMaya".into()],
            referral_code_len: 8,
            pending_list_limit: 10,
            operators: vec![1],
        }
    }

    /// The notification target for admin-facing events.
    pub fn primary_operator(&self) -> AccountId {
        self.operators.first().copied().unwrap_or_default()
    }

    pub fn is_operator(&self, id: AccountId) -> bool {
        self.operators.contains(&id)
    }
}
