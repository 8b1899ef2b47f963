//! SQLite persistence layer.
//!
//! RULE: Only this module talks to the database.
//! Engines call store methods and never execute SQL directly.
//!
//! Every balance-affecting operation is a single statement or a single
//! transaction, so concurrent handles on the same database cannot
//! interleave a read-modify-write on one account.

mod account;
mod referral;
mod session;
mod submission;
mod withdrawal;

pub use account::{AccountRecord, AccountTotals};
pub use referral::ReferralStats;
pub use submission::{PendingSubmission, SubmissionRecord, SubmissionTotals};
pub use withdrawal::{PendingWithdrawal, WithdrawalRecord, WithdrawalTotals};

use crate::{error::MarketResult, event::EventLogEntry};
use rusqlite::{params, Connection};
use std::sync::atomic::{AtomicU64, Ordering};

pub struct MarketStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file or URI
}

impl MarketStore {
    pub fn open(path: &str) -> MarketResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an isolated in-memory database.
    pub fn in_memory() -> MarketResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Open a fresh shared-memory database that `reopen()` can attach to.
    /// Used by tests and the local driver; the database lives as long as
    /// at least one connection stays open.
    pub fn in_memory_shared() -> MarketResult<Self> {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        let tag = NEXT.fetch_add(1, Ordering::Relaxed);
        let uri = format!(
            "file:market_{}_{}?mode=memory&cache=shared",
            std::process::id(),
            tag
        );
        Self::open(&uri)
    }

    /// Whether `reopen()` attaches to this same database. True for file
    /// paths and shared-memory URIs, false for a plain `:memory:` store.
    pub fn is_shareable(&self) -> bool {
        self.path.is_some()
    }

    /// Reopen a new connection to the same database.
    /// For plain in-memory databases this returns a new isolated database;
    /// use `in_memory_shared()` when multiple handles must agree.
    pub fn reopen(&self) -> MarketResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> MarketResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_sessions.sql"))?;
        Ok(())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> MarketResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (occurred_at, source, event_type, payload)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.occurred_at,
                entry.source,
                entry.event_type,
                entry.payload
            ],
        )?;
        Ok(())
    }

    pub fn event_count(&self, event_type: &str) -> MarketResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM event_log WHERE event_type = ?1",
                params![event_type],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    /// The newest entries, most recent first.
    pub fn recent_events(&self, limit: usize) -> MarketResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, occurred_at, source, event_type, payload
             FROM event_log ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(EventLogEntry {
                id: row.get(0)?,
                occurred_at: row.get(1)?,
                source: row.get(2)?,
                event_type: row.get(3)?,
                payload: row.get(4)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
