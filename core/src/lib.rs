//! Marketplace ledger and workflow core.
//!
//! Accounts earn balance through reviewed credential submissions and
//! referral rewards, and spend it through operator-processed
//! withdrawals. All state lives in SQLite; only `store` talks to the
//! database, the engines above it own the rules, and `engine` ties them
//! together behind injected transport collaborators.

pub mod command;
pub mod config;
pub mod conversation;
pub mod engine;
pub mod error;
pub mod event;
pub mod referral_engine;
pub mod rng;
pub mod store;
pub mod submission_engine;
pub mod transport;
pub mod types;
pub mod withdrawal_engine;

pub use engine::MarketEngine;
pub use error::{MarketError, MarketResult};
