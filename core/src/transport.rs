//! Collaborator contracts consumed by the core.
//!
//! The chat transport, membership checks, and operator notification are
//! external concerns; the core only sees these traits. Implementations are
//! injected into `MarketEngine` at construction, never pulled from ambient globals.

use crate::event::MarketEvent;
use crate::types::AccountId;

/// Membership gate against the required channel.
pub trait ChannelDirectory {
    fn is_channel_member(&self, account_id: AccountId) -> bool;
}

/// Push an admin-facing event to an operator.
///
/// Delivery is best-effort with respect to the ledger: a failed notify is
/// logged and dropped, never rolled back or retried by the core.
pub trait Notifier {
    fn notify(&self, operator_id: AccountId, event: &MarketEvent) -> anyhow::Result<()>;
}

/// Directory that accepts everyone. Used in tests and by the local driver.
pub struct OpenDirectory;

impl ChannelDirectory for OpenDirectory {
    fn is_channel_member(&self, _account_id: AccountId) -> bool {
        true
    }
}

/// Directory that rejects everyone.
pub struct ClosedDirectory;

impl ChannelDirectory for ClosedDirectory {
    fn is_channel_member(&self, _account_id: AccountId) -> bool {
        false
    }
}

/// Notifier that logs events instead of delivering them.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, operator_id: AccountId, event: &MarketEvent) -> anyhow::Result<()> {
        log::info!("notify operator {operator_id}: {event:?}");
        Ok(())
    }
}
