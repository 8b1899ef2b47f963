//! Account ledger queries.

use super::MarketStore;
use crate::{
    error::{MarketError, MarketResult},
    types::{AccountId, UnixTime},
};
use rusqlite::{params, OptionalExtension};

#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub account_id: AccountId,
    pub handle: String,
    pub joined_at: UnixTime,
    pub balance: f64,
    pub points: i64,
    pub lifetime_earned: f64,
    pub referral_code: String,
    pub referred_by: Option<AccountId>,
    pub payout_method: Option<String>,
    pub payout_account: Option<String>,
    pub channel_verified: bool,
    pub banned: bool,
}

impl AccountRecord {
    pub fn payout_bound(&self) -> bool {
        self.payout_method.is_some() && self.payout_account.is_some()
    }
}

/// Sums across all accounts, for the operator stats view.
#[derive(Debug, Clone, Copy)]
pub struct AccountTotals {
    pub accounts: i64,
    pub balance: f64,
    pub lifetime_earned: f64,
}

const ACCOUNT_COLUMNS: &str = "account_id, handle, joined_at, balance, points, lifetime_earned,
        referral_code, referred_by, payout_method, payout_account,
        channel_verified, banned";

fn account_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<AccountRecord> {
    Ok(AccountRecord {
        account_id: row.get(0)?,
        handle: row.get(1)?,
        joined_at: row.get(2)?,
        balance: row.get(3)?,
        points: row.get(4)?,
        lifetime_earned: row.get(5)?,
        referral_code: row.get(6)?,
        referred_by: row.get(7)?,
        payout_method: row.get(8)?,
        payout_account: row.get(9)?,
        channel_verified: row.get::<_, i32>(10)? != 0,
        banned: row.get::<_, i32>(11)? != 0,
    })
}

impl MarketStore {
    /// Create the account if absent. Returns false (no-op) when the id
    /// already exists; account creation is idempotent.
    pub fn insert_account(
        &self,
        account_id: AccountId,
        handle: &str,
        referral_code: &str,
        now: UnixTime,
    ) -> MarketResult<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO account (account_id, handle, joined_at, referral_code)
             VALUES (?1, ?2, ?3, ?4)",
            params![account_id, handle, now, referral_code],
        )?;
        Ok(changed > 0)
    }

    pub fn get_account(&self, account_id: AccountId) -> MarketResult<Option<AccountRecord>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM account WHERE account_id = ?1");
        self.conn
            .query_row(&query, params![account_id], account_row_mapper)
            .optional()
            .map_err(Into::into)
    }

    /// Apply a signed balance delta. Credits also raise lifetime_earned
    /// (which only ever increases); a debit that would drive the balance
    /// negative changes nothing and fails with InsufficientBalance.
    ///
    /// The predicate carries a half-cent tolerance so a full-balance debit
    /// is never rejected over float residue; the stored balance is clamped
    /// at zero for the same reason.
    pub fn adjust_balance(&self, account_id: AccountId, delta: f64) -> MarketResult<()> {
        let changed = self.conn.execute(
            "UPDATE account
             SET balance = MAX(balance + ?1, 0.0),
                 lifetime_earned = lifetime_earned + MAX(?1, 0.0)
             WHERE account_id = ?2 AND balance + ?1 >= -0.005",
            params![delta, account_id],
        )?;
        if changed == 0 {
            return match self.get_account(account_id)? {
                Some(account) => Err(MarketError::InsufficientBalance {
                    balance: account.balance,
                    requested: -delta,
                }),
                None => Err(MarketError::NotFound {
                    entity: "account",
                    id: account_id.to_string(),
                }),
            };
        }
        Ok(())
    }

    pub fn set_payout_info(
        &self,
        account_id: AccountId,
        method: &str,
        number: &str,
    ) -> MarketResult<()> {
        self.conn.execute(
            "UPDATE account SET payout_method = ?1, payout_account = ?2
             WHERE account_id = ?3",
            params![method, number, account_id],
        )?;
        Ok(())
    }

    pub fn set_channel_verified(&self, account_id: AccountId, verified: bool) -> MarketResult<()> {
        self.conn.execute(
            "UPDATE account SET channel_verified = ?1 WHERE account_id = ?2",
            params![if verified { 1 } else { 0 }, account_id],
        )?;
        Ok(())
    }

    pub fn set_banned(&self, account_id: AccountId, banned: bool) -> MarketResult<()> {
        self.conn.execute(
            "UPDATE account SET banned = ?1 WHERE account_id = ?2",
            params![if banned { 1 } else { 0 }, account_id],
        )?;
        Ok(())
    }

    pub fn account_by_referral_code(&self, code: &str) -> MarketResult<Option<AccountId>> {
        self.conn
            .query_row(
                "SELECT account_id FROM account WHERE referral_code = ?1",
                params![code],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn account_totals(&self) -> MarketResult<AccountTotals> {
        self.conn
            .query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(balance), 0.0),
                        COALESCE(SUM(lifetime_earned), 0.0)
                 FROM account",
                [],
                |row| {
                    Ok(AccountTotals {
                        accounts: row.get(0)?,
                        balance: row.get(1)?,
                        lifetime_earned: row.get(2)?,
                    })
                },
            )
            .map_err(Into::into)
    }
}
