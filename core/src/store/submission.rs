//! Submission queries, including the transactional review.

use super::MarketStore;
use crate::{
    error::{MarketError, MarketResult},
    event::ReviewOutcome,
    types::{AccountId, SubmissionId, UnixTime},
};
use rusqlite::{params, OptionalExtension};

#[derive(Debug, Clone)]
pub struct SubmissionRecord {
    pub submission_id: SubmissionId,
    pub account_id: AccountId,
    pub credential_id: String,
    pub credential_secret: String,
    pub status: String,
    pub earnings: f64,
    pub reviewer: Option<AccountId>,
    pub submitted_at: UnixTime,
    pub reviewed_at: Option<UnixTime>,
}

/// A pending submission joined with its owner, for operator triage.
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    pub submission_id: SubmissionId,
    pub account_id: AccountId,
    pub handle: String,
    pub credential_id: String,
    pub submitted_at: UnixTime,
}

#[derive(Debug, Clone, Copy)]
pub struct SubmissionTotals {
    pub total: i64,
    pub valid: i64,
    pub pending: i64,
    pub earnings_paid: f64,
}

impl MarketStore {
    pub fn insert_submission(
        &self,
        account_id: AccountId,
        credential_id: &str,
        credential_secret: &str,
        now: UnixTime,
    ) -> MarketResult<SubmissionId> {
        self.conn.execute(
            "INSERT INTO submission (account_id, credential_id, credential_secret, submitted_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![account_id, credential_id, credential_secret, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_submission(
        &self,
        submission_id: SubmissionId,
    ) -> MarketResult<Option<SubmissionRecord>> {
        self.conn
            .query_row(
                "SELECT submission_id, account_id, credential_id, credential_secret,
                        status, earnings, reviewer, submitted_at, reviewed_at
                 FROM submission WHERE submission_id = ?1",
                params![submission_id],
                |row| {
                    Ok(SubmissionRecord {
                        submission_id: row.get(0)?,
                        account_id: row.get(1)?,
                        credential_id: row.get(2)?,
                        credential_secret: row.get(3)?,
                        status: row.get(4)?,
                        earnings: row.get(5)?,
                        reviewer: row.get(6)?,
                        submitted_at: row.get(7)?,
                        reviewed_at: row.get(8)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn pending_submissions(&self, limit: usize) -> MarketResult<Vec<PendingSubmission>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.submission_id, s.account_id, a.handle, s.credential_id, s.submitted_at
             FROM submission s
             JOIN account a ON s.account_id = a.account_id
             WHERE s.status = 'pending'
             ORDER BY s.submitted_at ASC, s.submission_id ASC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(PendingSubmission {
                submission_id: row.get(0)?,
                account_id: row.get(1)?,
                handle: row.get(2)?,
                credential_id: row.get(3)?,
                submitted_at: row.get(4)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Apply a review decision. The pending→terminal transition, the owner
    /// credit, and the referral-edge attribution happen in one transaction:
    /// either all commit or none do. A submission that is no longer
    /// pending fails with Conflict and nothing changes.
    ///
    /// Returns the owning account id.
    pub fn review_submission(
        &self,
        submission_id: SubmissionId,
        reviewer: AccountId,
        outcome: ReviewOutcome,
        earnings: f64,
        now: UnixTime,
    ) -> MarketResult<AccountId> {
        let tx = self.conn.unchecked_transaction()?;

        let row: Option<(AccountId, String)> = tx
            .query_row(
                "SELECT account_id, status FROM submission WHERE submission_id = ?1",
                params![submission_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (account_id, status) = row.ok_or(MarketError::NotFound {
            entity: "submission",
            id: submission_id.to_string(),
        })?;
        if status != "pending" {
            return Err(MarketError::Conflict {
                entity: "submission",
                id: submission_id.to_string(),
            });
        }

        tx.execute(
            "UPDATE submission
             SET status = ?1, earnings = ?2, reviewer = ?3, reviewed_at = ?4
             WHERE submission_id = ?5 AND status = 'pending'",
            params![outcome.as_str(), earnings, reviewer, now, submission_id],
        )?;

        if outcome == ReviewOutcome::Valid && earnings > 0.0 {
            tx.execute(
                "UPDATE account
                 SET balance = balance + ?1, lifetime_earned = lifetime_earned + ?1
                 WHERE account_id = ?2",
                params![earnings, account_id],
            )?;
            // Attribute the earnings to the inbound referral edge, if any.
            tx.execute(
                "UPDATE referral_edge
                 SET earnings_generated = earnings_generated + ?1
                 WHERE referred_id = ?2",
                params![earnings, account_id],
            )?;
        }

        tx.commit()?;
        Ok(account_id)
    }

    pub fn submission_stats(&self, account_id: AccountId) -> MarketResult<SubmissionTotals> {
        self.conn
            .query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(CASE WHEN status = 'valid' THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(earnings), 0.0)
                 FROM submission WHERE account_id = ?1",
                params![account_id],
                submission_totals_mapper,
            )
            .map_err(Into::into)
    }

    pub fn aggregate_submission_stats(&self) -> MarketResult<SubmissionTotals> {
        self.conn
            .query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(CASE WHEN status = 'valid' THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(earnings), 0.0)
                 FROM submission",
                [],
                submission_totals_mapper,
            )
            .map_err(Into::into)
    }
}

fn submission_totals_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<SubmissionTotals> {
    Ok(SubmissionTotals {
        total: row.get(0)?,
        valid: row.get(1)?,
        pending: row.get(2)?,
        earnings_paid: row.get(3)?,
    })
}
