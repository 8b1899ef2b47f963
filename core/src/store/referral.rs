//! Referral edge queries.

use super::MarketStore;
use crate::{
    error::MarketResult,
    types::{AccountId, UnixTime},
};
use rusqlite::params;

/// Referral counts for one referrer, for the stats view.
#[derive(Debug, Clone, Copy)]
pub struct ReferralStats {
    pub referred_count: i64,
    pub earnings_generated: f64,
}

impl MarketStore {
    /// Record a referral edge and credit the referrer's reward in one
    /// transaction. Returns false (nothing changes) when the referred
    /// account already carries a referred_by; the guarded UPDATE is the
    /// idempotency gate, so replays of a stale code cannot double-credit.
    pub fn register_referral(
        &self,
        referrer_id: AccountId,
        referred_id: AccountId,
        reward: f64,
        now: UnixTime,
    ) -> MarketResult<bool> {
        let tx = self.conn.unchecked_transaction()?;

        let claimed = tx.execute(
            "UPDATE account SET referred_by = ?1
             WHERE account_id = ?2 AND referred_by IS NULL",
            params![referrer_id, referred_id],
        )?;
        if claimed == 0 {
            return Ok(false);
        }

        // referred_id is UNIQUE; OR IGNORE covers an edge left by a
        // partially-applied legacy import.
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO referral_edge (referrer_id, referred_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![referrer_id, referred_id, now],
        )?;
        if inserted == 0 {
            return Ok(false);
        }

        tx.execute(
            "UPDATE account
             SET balance = balance + ?1, lifetime_earned = lifetime_earned + ?1
             WHERE account_id = ?2",
            params![reward, referrer_id],
        )?;

        tx.commit()?;
        Ok(true)
    }

    pub fn referral_stats(&self, referrer_id: AccountId) -> MarketResult<ReferralStats> {
        self.conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(earnings_generated), 0.0)
                 FROM referral_edge WHERE referrer_id = ?1",
                params![referrer_id],
                |row| {
                    Ok(ReferralStats {
                        referred_count: row.get(0)?,
                        earnings_generated: row.get(1)?,
                    })
                },
            )
            .map_err(Into::into)
    }
}
