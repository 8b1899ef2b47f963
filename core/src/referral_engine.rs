//! Referral engine.
//!
//! Tracks referrer→referred edges and pays the flat reward on successful
//! registration. Registration failures are silent (false, not an error):
//! a /start replayed with a stale code must be a no-op, not a crash.
//!
//! The unlock threshold gates what the presentation layer shows, not
//! whether a referrer gets credited.

use crate::{
    config::MarketConfig,
    error::MarketResult,
    event::MarketEvent,
    store::{MarketStore, ReferralStats},
    types::AccountId,
};

pub struct ReferralEngine {
    store: MarketStore,
    config: MarketConfig,
}

impl ReferralEngine {
    pub fn new(store: MarketStore, config: MarketConfig) -> Self {
        Self { store, config }
    }

    /// Resolve a referral code and, when it names somebody else and the
    /// new account has never been referred, record the edge and credit the
    /// referrer. Returns whether a reward was paid.
    pub fn register(
        &self,
        referrer_code: &str,
        new_account_id: AccountId,
        now: i64,
    ) -> MarketResult<(bool, Vec<MarketEvent>)> {
        let referrer_id = match self.store.account_by_referral_code(referrer_code)? {
            Some(id) => id,
            None => return Ok((false, vec![])),
        };
        if referrer_id == new_account_id {
            return Ok((false, vec![]));
        }

        let reward = self.config.referral_reward;
        if !self
            .store
            .register_referral(referrer_id, new_account_id, reward, now)?
        {
            return Ok((false, vec![]));
        }
        log::debug!("referral {referrer_id} -> {new_account_id} rewarded {reward:.2}");

        Ok((
            true,
            vec![MarketEvent::ReferralRegistered {
                referrer_id,
                referred_id: new_account_id,
                reward,
            }],
        ))
    }

    /// Whether lifetime earnings have crossed the referral unlock
    /// threshold. Missing accounts are simply locked.
    pub fn is_unlocked(&self, account_id: AccountId) -> MarketResult<bool> {
        Ok(self
            .store
            .get_account(account_id)?
            .map(|a| a.lifetime_earned >= self.config.referral_unlock_threshold)
            .unwrap_or(false))
    }

    pub fn stats(&self, referrer_id: AccountId) -> MarketResult<ReferralStats> {
        self.store.referral_stats(referrer_id)
    }
}
