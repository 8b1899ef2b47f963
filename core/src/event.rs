//! Ledger events.
//!
//! Every ledger mutation emits one of these. The engine appends each event
//! to the event_log table and forwards the admin-facing ones to the
//! notifier collaborator. Variants are added over time, never removed
//! or reordered.
//!
//! RULE: events never carry a credential secret. Operators see the
//! identifier only.

use crate::types::{AccountId, SubmissionId, UnixTime, WithdrawalId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketEvent {
    AccountCreated {
        account_id: AccountId,
        handle: String,
        referral_code: String,
    },
    SubmissionReceived {
        submission_id: SubmissionId,
        account_id: AccountId,
        handle: String,
        credential_id: String,
    },
    SubmissionReviewed {
        submission_id: SubmissionId,
        account_id: AccountId,
        reviewer: AccountId,
        outcome: ReviewOutcome,
        earnings: f64,
    },
    WithdrawalRequested {
        withdrawal_id: WithdrawalId,
        account_id: AccountId,
        handle: String,
        amount: f64,
        payout_method: String,
        payout_account: String,
    },
    WithdrawalProcessed {
        withdrawal_id: WithdrawalId,
        account_id: AccountId,
        processor: AccountId,
        outcome: WithdrawalOutcome,
        amount: f64,
    },
    ReferralRegistered {
        referrer_id: AccountId,
        referred_id: AccountId,
        reward: f64,
    },
}

impl MarketEvent {
    /// True when the event should be pushed to the operator channel.
    pub fn is_operator_facing(&self) -> bool {
        matches!(
            self,
            Self::SubmissionReceived { .. } | Self::WithdrawalRequested { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewOutcome {
    Valid,
    Invalid,
}

impl ReviewOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Invalid => "invalid",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalOutcome {
    Approved,
    Rejected,
}

impl WithdrawalOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub occurred_at: UnixTime,
    pub source: String,
    pub event_type: String,
    pub payload: String, // JSON-serialized MarketEvent
}

/// Extract a stable string name from a MarketEvent variant.
/// Used for the event_type column in event_log.
pub fn event_type_name(event: &MarketEvent) -> &'static str {
    match event {
        MarketEvent::AccountCreated { .. } => "account_created",
        MarketEvent::SubmissionReceived { .. } => "submission_received",
        MarketEvent::SubmissionReviewed { .. } => "submission_reviewed",
        MarketEvent::WithdrawalRequested { .. } => "withdrawal_requested",
        MarketEvent::WithdrawalProcessed { .. } => "withdrawal_processed",
        MarketEvent::ReferralRegistered { .. } => "referral_registered",
    }
}
