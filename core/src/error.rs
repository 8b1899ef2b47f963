use thiserror::Error;

/// Error taxonomy for every engine operation.
///
/// `Database` is the transient store-unavailable case: the transport may
/// retry it, and must not assume the operation committed. `Validation`
/// re-prompts the same conversation step. `Conflict` is the idempotency
/// guard (already reviewed / already processed / already referred) and is
/// never retried. The precondition variants are user-correctable.
#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} '{id}' was already processed")]
    Conflict { entity: &'static str, id: String },

    #[error("Operator-only operation")]
    PermissionDenied,

    #[error("No payout destination bound")]
    PayoutNotBound,

    #[error("Amount is below the minimum of {minimum:.2}")]
    BelowMinimum { minimum: f64 },

    #[error("Insufficient balance: have {balance:.2}, need {requested:.2}")]
    InsufficientBalance { balance: f64, requested: f64 },

    #[error("Channel membership not verified")]
    ChannelNotVerified,

    #[error("Account is banned")]
    AccountBanned,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MarketError {
    /// True for the user-correctable guard failures (the conversation
    /// layer turns these into guidance rather than hard errors).
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::PayoutNotBound
                | Self::BelowMinimum { .. }
                | Self::InsufficientBalance { .. }
                | Self::ChannelNotVerified
                | Self::AccountBanned
        )
    }
}

pub type MarketResult<T> = Result<T, MarketError>;
