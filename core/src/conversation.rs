//! Conversation orchestrator: the per-account multi-turn state machine.
//!
//! Sessions are persisted rows, not process memory: a restart resumes (or
//! lets the participant cancel) an in-flight workflow instead of losing
//! it. At most one session per account; starting a new workflow replaces
//! the active one. No ledger mutation happens before a terminal step, so
//! abandonment never leaves partial state.
//!
//! The orchestrator validates and collects input, then hands a typed
//! action back to the facade; it never mutates balances itself.

use crate::{
    config::MarketConfig,
    error::MarketResult,
    store::{AccountRecord, MarketStore},
    types::AccountId,
};
use serde::{Deserialize, Serialize};

/// Workflow entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workflow {
    Submit,
    BindPayout,
    Withdraw,
}

/// The persisted step of an active session. Transient collected fields
/// (the chosen payout method) live inside the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum SessionStep {
    AwaitingSubmissionText,
    AwaitingPayoutMethod,
    AwaitingPayoutNumber { method: String },
    AwaitingWithdrawAmount,
}

/// What the transport should ask next. Rendering is out of scope; these
/// carry just enough for the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    JoinChannel,
    SendCredential,
    MalformedCredential,
    WrongCredentialDomain { domain: String },
    ChoosePayoutMethod { methods: Vec<String> },
    SendPayoutNumber { method: String },
    InvalidPayoutNumber { expected_len: usize },
    SendWithdrawAmount { balance: f64 },
    InvalidAmount,
    AmountBelowMinimum { minimum: f64 },
    AmountExceedsBalance { balance: f64 },
    PayoutNotBound,
    BalanceBelowMinimum { balance: f64, minimum: f64 },
}

/// Result of feeding one turn into the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Ask (or re-ask) something; the session stays where the variant says.
    Prompt(Prompt),
    /// Terminal: a syntactically valid credential was collected.
    SubmitCredential {
        credential_id: String,
        credential_secret: String,
    },
    /// Terminal: a payout destination was collected.
    BindPayout { method: String, number: String },
    /// Terminal: a withdrawal amount was collected.
    RequestWithdrawal { amount: f64 },
    Cancelled,
    /// No active session claims this input.
    Ignored,
}

pub struct Conversation {
    store: MarketStore,
    config: MarketConfig,
}

impl Conversation {
    pub fn new(store: MarketStore, config: MarketConfig) -> Self {
        Self { store, config }
    }

    /// Enter a workflow. Guards that fail leave the account Idle (any
    /// active session is discarded) and return guidance instead.
    pub fn start(
        &self,
        account: &AccountRecord,
        workflow: Workflow,
        now: i64,
    ) -> MarketResult<TurnOutcome> {
        let id = account.account_id;
        match workflow {
            Workflow::Submit => {
                if !account.channel_verified {
                    self.store.clear_session(id)?;
                    return Ok(TurnOutcome::Prompt(Prompt::JoinChannel));
                }
                self.store
                    .save_session(id, &SessionStep::AwaitingSubmissionText, now)?;
                Ok(TurnOutcome::Prompt(Prompt::SendCredential))
            }
            Workflow::BindPayout => {
                self.store
                    .save_session(id, &SessionStep::AwaitingPayoutMethod, now)?;
                Ok(TurnOutcome::Prompt(Prompt::ChoosePayoutMethod {
                    methods: self.config.payout_methods.clone(),
                }))
            }
            Workflow::Withdraw => {
                if !account.payout_bound() {
                    self.store.clear_session(id)?;
                    return Ok(TurnOutcome::Prompt(Prompt::PayoutNotBound));
                }
                if account.balance < self.config.min_withdrawal {
                    self.store.clear_session(id)?;
                    return Ok(TurnOutcome::Prompt(Prompt::BalanceBelowMinimum {
                        balance: account.balance,
                        minimum: self.config.min_withdrawal,
                    }));
                }
                self.store
                    .save_session(id, &SessionStep::AwaitingWithdrawAmount, now)?;
                Ok(TurnOutcome::Prompt(Prompt::SendWithdrawAmount {
                    balance: account.balance,
                }))
            }
        }
    }

    /// Feed a free-text turn into the active session, if any.
    pub fn on_text(&self, account: &AccountRecord, text: &str) -> MarketResult<TurnOutcome> {
        let id = account.account_id;
        let step = match self.store.load_session(id)? {
            Some(step) => step,
            None => return Ok(TurnOutcome::Ignored),
        };
        let text = text.trim();

        match step {
            SessionStep::AwaitingSubmissionText => {
                // identifier:secret, split on the FIRST colon.
                let Some((identifier, secret)) = text.split_once(':') else {
                    return Ok(TurnOutcome::Prompt(Prompt::MalformedCredential));
                };
                let identifier = identifier.trim();
                let secret = secret.trim();
                if identifier.is_empty() || secret.is_empty() {
                    return Ok(TurnOutcome::Prompt(Prompt::MalformedCredential));
                }
                let domain = &self.config.credential_domain;
                if !identifier.to_lowercase().contains(&domain.to_lowercase()) {
                    return Ok(TurnOutcome::Prompt(Prompt::WrongCredentialDomain {
                        domain: domain.clone(),
                    }));
                }
                self.store.clear_session(id)?;
                Ok(TurnOutcome::SubmitCredential {
                    credential_id: identifier.to_string(),
                    credential_secret: secret.to_string(),
                })
            }
            SessionStep::AwaitingPayoutMethod => {
                // Method selection arrives via select_method; plain text
                // just gets the chooser again.
                Ok(TurnOutcome::Prompt(Prompt::ChoosePayoutMethod {
                    methods: self.config.payout_methods.clone(),
                }))
            }
            SessionStep::AwaitingPayoutNumber { method } => {
                let expected = self.config.payout_number_len;
                if text.len() != expected || !text.bytes().all(|b| b.is_ascii_digit()) {
                    return Ok(TurnOutcome::Prompt(Prompt::InvalidPayoutNumber {
                        expected_len: expected,
                    }));
                }
                self.store.clear_session(id)?;
                Ok(TurnOutcome::BindPayout {
                    method,
                    number: text.to_string(),
                })
            }
            SessionStep::AwaitingWithdrawAmount => {
                let Ok(amount) = text.parse::<f64>() else {
                    return Ok(TurnOutcome::Prompt(Prompt::InvalidAmount));
                };
                if !amount.is_finite() {
                    return Ok(TurnOutcome::Prompt(Prompt::InvalidAmount));
                }
                if amount < self.config.min_withdrawal {
                    return Ok(TurnOutcome::Prompt(Prompt::AmountBelowMinimum {
                        minimum: self.config.min_withdrawal,
                    }));
                }
                if amount > account.balance {
                    return Ok(TurnOutcome::Prompt(Prompt::AmountExceedsBalance {
                        balance: account.balance,
                    }));
                }
                self.store.clear_session(id)?;
                Ok(TurnOutcome::RequestWithdrawal { amount })
            }
        }
    }

    /// A payout-method selection arriving as a button callback rather
    /// than free text. Only meaningful while AwaitingPayoutMethod.
    pub fn select_method(
        &self,
        account_id: AccountId,
        method: &str,
        now: i64,
    ) -> MarketResult<TurnOutcome> {
        match self.store.load_session(account_id)? {
            Some(SessionStep::AwaitingPayoutMethod) => {}
            _ => return Ok(TurnOutcome::Ignored),
        }
        let Some(method) = self
            .config
            .payout_methods
            .iter()
            .find(|m| m.eq_ignore_ascii_case(method))
        else {
            return Ok(TurnOutcome::Prompt(Prompt::ChoosePayoutMethod {
                methods: self.config.payout_methods.clone(),
            }));
        };
        self.store.save_session(
            account_id,
            &SessionStep::AwaitingPayoutNumber {
                method: method.clone(),
            },
            now,
        )?;
        Ok(TurnOutcome::Prompt(Prompt::SendPayoutNumber {
            method: method.clone(),
        }))
    }

    /// Explicit cancel: any step back to Idle, transient fields dropped.
    pub fn cancel(&self, account_id: AccountId) -> MarketResult<TurnOutcome> {
        if self.store.load_session(account_id)?.is_none() {
            return Ok(TurnOutcome::Ignored);
        }
        self.store.clear_session(account_id)?;
        Ok(TurnOutcome::Cancelled)
    }

    /// The active step, if any. Used by tests and the local driver.
    pub fn current_step(&self, account_id: AccountId) -> MarketResult<Option<SessionStep>> {
        self.store.load_session(account_id)
    }
}
