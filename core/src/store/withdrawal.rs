//! Withdrawal queries, including the transactional decision.

use super::MarketStore;
use crate::{
    error::{MarketError, MarketResult},
    event::WithdrawalOutcome,
    types::{AccountId, UnixTime, WithdrawalId},
};
use rusqlite::{params, OptionalExtension};

#[derive(Debug, Clone)]
pub struct WithdrawalRecord {
    pub withdrawal_id: WithdrawalId,
    pub account_id: AccountId,
    pub amount: f64,
    pub status: String,
    pub requested_at: UnixTime,
    pub processed_at: Option<UnixTime>,
    pub processor: Option<AccountId>,
}

/// A pending request joined with its owner's payout destination.
#[derive(Debug, Clone)]
pub struct PendingWithdrawal {
    pub withdrawal_id: WithdrawalId,
    pub account_id: AccountId,
    pub handle: String,
    pub amount: f64,
    pub payout_method: Option<String>,
    pub payout_account: Option<String>,
    pub requested_at: UnixTime,
}

#[derive(Debug, Clone, Copy)]
pub struct WithdrawalTotals {
    pub approved_count: i64,
    pub approved_amount: f64,
}

impl MarketStore {
    pub fn insert_withdrawal(
        &self,
        account_id: AccountId,
        amount: f64,
        now: UnixTime,
    ) -> MarketResult<WithdrawalId> {
        self.conn.execute(
            "INSERT INTO withdrawal (account_id, amount, requested_at)
             VALUES (?1, ?2, ?3)",
            params![account_id, amount, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_withdrawal(
        &self,
        withdrawal_id: WithdrawalId,
    ) -> MarketResult<Option<WithdrawalRecord>> {
        self.conn
            .query_row(
                "SELECT withdrawal_id, account_id, amount, status,
                        requested_at, processed_at, processor
                 FROM withdrawal WHERE withdrawal_id = ?1",
                params![withdrawal_id],
                |row| {
                    Ok(WithdrawalRecord {
                        withdrawal_id: row.get(0)?,
                        account_id: row.get(1)?,
                        amount: row.get(2)?,
                        status: row.get(3)?,
                        requested_at: row.get(4)?,
                        processed_at: row.get(5)?,
                        processor: row.get(6)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn pending_withdrawals(&self, limit: usize) -> MarketResult<Vec<PendingWithdrawal>> {
        let mut stmt = self.conn.prepare(
            "SELECT w.withdrawal_id, w.account_id, a.handle, w.amount,
                    a.payout_method, a.payout_account, w.requested_at
             FROM withdrawal w
             JOIN account a ON w.account_id = a.account_id
             WHERE w.status = 'pending'
             ORDER BY w.requested_at ASC, w.withdrawal_id ASC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(PendingWithdrawal {
                withdrawal_id: row.get(0)?,
                account_id: row.get(1)?,
                handle: row.get(2)?,
                amount: row.get(3)?,
                payout_method: row.get(4)?,
                payout_account: row.get(5)?,
                requested_at: row.get(6)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Apply a withdrawal decision. On approval the balance is re-checked
    /// at decision time by the guarded debit: when the guard fails the
    /// transaction rolls back, the request STAYS pending for reprocessing,
    /// and InsufficientBalance is returned. Debit and status transition
    /// are all-or-nothing.
    ///
    /// Returns (owning account id, amount).
    pub fn process_withdrawal(
        &self,
        withdrawal_id: WithdrawalId,
        processor: AccountId,
        outcome: WithdrawalOutcome,
        now: UnixTime,
    ) -> MarketResult<(AccountId, f64)> {
        let tx = self.conn.unchecked_transaction()?;

        let row: Option<(AccountId, f64, String)> = tx
            .query_row(
                "SELECT account_id, amount, status FROM withdrawal WHERE withdrawal_id = ?1",
                params![withdrawal_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let (account_id, amount, status) = row.ok_or(MarketError::NotFound {
            entity: "withdrawal",
            id: withdrawal_id.to_string(),
        })?;
        if status != "pending" {
            return Err(MarketError::Conflict {
                entity: "withdrawal",
                id: withdrawal_id.to_string(),
            });
        }

        if outcome == WithdrawalOutcome::Approved {
            // Half-cent tolerance: a full-balance withdrawal must not be
            // rejected over float residue. Balance is clamped at zero.
            let debited = tx.execute(
                "UPDATE account
                 SET balance = MAX(balance - ?1, 0.0)
                 WHERE account_id = ?2 AND balance >= ?1 - 0.005",
                params![amount, account_id],
            )?;
            if debited == 0 {
                let balance: f64 = tx.query_row(
                    "SELECT balance FROM account WHERE account_id = ?1",
                    params![account_id],
                    |row| row.get(0),
                )?;
                // Dropping tx rolls back; the request stays pending.
                return Err(MarketError::InsufficientBalance {
                    balance,
                    requested: amount,
                });
            }
        }

        tx.execute(
            "UPDATE withdrawal
             SET status = ?1, processor = ?2, processed_at = ?3
             WHERE withdrawal_id = ?4 AND status = 'pending'",
            params![outcome.as_str(), processor, now, withdrawal_id],
        )?;

        tx.commit()?;
        Ok((account_id, amount))
    }

    pub fn approved_withdrawal_totals(&self) -> MarketResult<WithdrawalTotals> {
        self.conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(amount), 0.0)
                 FROM withdrawal WHERE status = 'approved'",
                [],
                |row| {
                    Ok(WithdrawalTotals {
                        approved_count: row.get(0)?,
                        approved_amount: row.get(1)?,
                    })
                },
            )
            .map_err(Into::into)
    }
}
