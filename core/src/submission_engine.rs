//! Submission review engine.
//!
//! Governs a credential record from pending to a terminal valid/invalid
//! state. The pending→terminal transition is taken exactly once; crediting
//! rides the same store transaction as the status change.

use crate::{
    config::MarketConfig,
    error::{MarketError, MarketResult},
    event::{MarketEvent, ReviewOutcome},
    store::{MarketStore, PendingSubmission},
    types::{AccountId, SubmissionId},
};

pub struct SubmissionEngine {
    store: MarketStore,
    config: MarketConfig,
}

impl SubmissionEngine {
    pub fn new(store: MarketStore, config: MarketConfig) -> Self {
        Self { store, config }
    }

    /// Syntactic check shared with the conversation layer: non-empty
    /// identifier carrying the configured domain suffix, non-empty secret.
    pub fn validate_credential(&self, credential_id: &str, secret: &str) -> MarketResult<()> {
        if credential_id.is_empty() || secret.is_empty() {
            return Err(MarketError::Validation(
                "credential identifier and secret must be non-empty".into(),
            ));
        }
        if !credential_id
            .to_lowercase()
            .contains(&self.config.credential_domain.to_lowercase())
        {
            return Err(MarketError::Validation(format!(
                "credential identifier must contain {}",
                self.config.credential_domain
            )));
        }
        Ok(())
    }

    /// Create a pending submission for review.
    ///
    /// The emitted event carries the identifier but never the secret.
    pub fn submit(
        &self,
        account_id: AccountId,
        credential_id: &str,
        credential_secret: &str,
        now: i64,
    ) -> MarketResult<(SubmissionId, Vec<MarketEvent>)> {
        let account =
            self.store
                .get_account(account_id)?
                .ok_or_else(|| MarketError::NotFound {
                    entity: "account",
                    id: account_id.to_string(),
                })?;
        if account.banned {
            return Err(MarketError::AccountBanned);
        }
        if !account.channel_verified {
            return Err(MarketError::ChannelNotVerified);
        }
        self.validate_credential(credential_id, credential_secret)?;

        let submission_id =
            self.store
                .insert_submission(account_id, credential_id, credential_secret, now)?;
        log::debug!("submission {submission_id} created for account {account_id}");

        Ok((
            submission_id,
            vec![MarketEvent::SubmissionReceived {
                submission_id,
                account_id,
                handle: account.handle,
                credential_id: credential_id.to_string(),
            }],
        ))
    }

    /// Decide a pending submission. A second decision on the same id fails
    /// with Conflict and credits nothing.
    pub fn decide(
        &self,
        submission_id: SubmissionId,
        reviewer: AccountId,
        outcome: ReviewOutcome,
        earnings: f64,
        now: i64,
    ) -> MarketResult<Vec<MarketEvent>> {
        let earnings = match outcome {
            ReviewOutcome::Valid => {
                if !earnings.is_finite() || earnings <= 0.0 {
                    return Err(MarketError::Validation(
                        "a valid submission needs positive finite earnings".into(),
                    ));
                }
                earnings
            }
            // earnings > 0 implies status = valid; invalid never credits.
            ReviewOutcome::Invalid => 0.0,
        };

        let account_id =
            self.store
                .review_submission(submission_id, reviewer, outcome, earnings, now)?;
        log::debug!(
            "submission {submission_id} decided {} by {reviewer}",
            outcome.as_str()
        );

        Ok(vec![MarketEvent::SubmissionReviewed {
            submission_id,
            account_id,
            reviewer,
            outcome,
            earnings,
        }])
    }

    /// Pending submissions in submitted_at order, for operator triage.
    pub fn list_pending(&self) -> MarketResult<Vec<PendingSubmission>> {
        self.store
            .pending_submissions(self.config.pending_list_limit)
    }
}
