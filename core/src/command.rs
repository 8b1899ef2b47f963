//! The operator control surface.
//!
//! Commands are parsed once, at the transport boundary, into this tagged
//! enum; engines never see free-text command strings.

use crate::event::{ReviewOutcome, WithdrawalOutcome};
use crate::types::{SubmissionId, WithdrawalId};
use serde::{Deserialize, Serialize};

/// All operator-issued commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum OperatorCommand {
    DecideSubmission {
        submission_id: SubmissionId,
        outcome: ReviewOutcome,
        /// Earnings credited on a valid outcome. Ignored for invalid.
        earnings: f64,
    },
    DecideWithdrawal {
        withdrawal_id: WithdrawalId,
        outcome: WithdrawalOutcome,
    },
    ListPending {
        kind: PendingKind,
    },
    Stats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingKind {
    Submissions,
    Withdrawals,
}

/// Parse the chat-command grammar into a structured command.
///
/// Recognized forms:
///   /valid_<id>_<amount>   approve submission <id>, crediting <amount>
///   /invalid_<id>          reject submission <id>
///   /approve_<id>          approve withdrawal <id>
///   /reject_<id>           reject withdrawal <id>
///   /pending_subs          list pending submissions
///   /pending_wd            list pending withdrawals
///   /admin_stats           aggregate statistics
///
/// Returns None for anything else; the transport treats that as a
/// non-command message.
pub fn parse(text: &str) -> Option<OperatorCommand> {
    let text = text.trim();
    match text {
        "/pending_subs" => {
            return Some(OperatorCommand::ListPending {
                kind: PendingKind::Submissions,
            })
        }
        "/pending_wd" => {
            return Some(OperatorCommand::ListPending {
                kind: PendingKind::Withdrawals,
            })
        }
        "/admin_stats" => return Some(OperatorCommand::Stats),
        _ => {}
    }

    if let Some(rest) = text.strip_prefix("/valid_") {
        let (id, amount) = rest.split_once('_')?;
        let earnings: f64 = amount.parse().ok()?;
        // "inf" and "nan" parse as f64; they are not amounts.
        if !earnings.is_finite() {
            return None;
        }
        return Some(OperatorCommand::DecideSubmission {
            submission_id: id.parse().ok()?,
            outcome: ReviewOutcome::Valid,
            earnings,
        });
    }
    if let Some(id) = text.strip_prefix("/invalid_") {
        return Some(OperatorCommand::DecideSubmission {
            submission_id: id.parse().ok()?,
            outcome: ReviewOutcome::Invalid,
            earnings: 0.0,
        });
    }
    if let Some(id) = text.strip_prefix("/approve_") {
        return Some(OperatorCommand::DecideWithdrawal {
            withdrawal_id: id.parse().ok()?,
            outcome: WithdrawalOutcome::Approved,
        });
    }
    if let Some(id) = text.strip_prefix("/reject_") {
        return Some(OperatorCommand::DecideWithdrawal {
            withdrawal_id: id.parse().ok()?,
            outcome: WithdrawalOutcome::Rejected,
        });
    }
    None
}
