//! Shared primitive types used across the entire engine.

/// An account identity, assigned by the transport (chat user id).
pub type AccountId = i64;

/// A submission identity (SQLite rowid; the operator command grammar
/// encodes these as plain integers).
pub type SubmissionId = i64;

/// A withdrawal-request identity (SQLite rowid).
pub type WithdrawalId = i64;

/// A unix timestamp in seconds, UTC.
pub type UnixTime = i64;
