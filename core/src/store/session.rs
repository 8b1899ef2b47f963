//! Conversation session persistence.
//!
//! One row per account; the step column holds the JSON-serialized
//! SessionStep so an engine restart can resume in-flight workflows.

use super::MarketStore;
use crate::{
    conversation::SessionStep,
    error::MarketResult,
    types::{AccountId, UnixTime},
};
use rusqlite::{params, OptionalExtension};

impl MarketStore {
    pub fn load_session(&self, account_id: AccountId) -> MarketResult<Option<SessionStep>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT step FROM session WHERE account_id = ?1",
                params![account_id],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Upsert: starting a new workflow replaces any active session.
    pub fn save_session(
        &self,
        account_id: AccountId,
        step: &SessionStep,
        now: UnixTime,
    ) -> MarketResult<()> {
        let json = serde_json::to_string(step)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO session (account_id, step, started_at)
             VALUES (?1, ?2, ?3)",
            params![account_id, json, now],
        )?;
        Ok(())
    }

    pub fn clear_session(&self, account_id: AccountId) -> MarketResult<()> {
        self.conn.execute(
            "DELETE FROM session WHERE account_id = ?1",
            params![account_id],
        )?;
        Ok(())
    }
}
