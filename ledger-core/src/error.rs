//! Error types for the betting ledger

use crate::types::BetStatus;
use thiserror::Error;
use uuid::Uuid;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed request (stake, selections, description)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Odds outside the allowed range or unparseable
    #[error("Invalid odds: {0}")]
    InvalidOdds(String),

    /// Balance too low for the requested stake
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Stake in minor units
        required: i64,
        /// Current balance in minor units
        available: i64,
    },

    /// User account does not exist
    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    /// User account exists but is inactive
    #[error("Account inactive: {0}")]
    AccountInactive(Uuid),

    /// Bet does not exist
    #[error("Bet not found: {0}")]
    BetNotFound(Uuid),

    /// Conditional settle rejected: the bet already left `pending`
    #[error("Bet {bet_id} already settled with status {status}")]
    AlreadySettled {
        /// Bet that was targeted
        bet_id: Uuid,
        /// Terminal status it holds
        status: BetStatus,
    },

    /// Balance read-modify-write raced with another writer
    #[error("Concurrency conflict: {0}")]
    Conflict(String),

    /// Transient storage failure (retryable)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether a settlement attempt hitting this error should be retried
    ///
    /// Mirrors the split in §7: storage and concurrency failures are
    /// transient; validation, missing entities, and terminal-state
    /// rejections are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::Conflict(_) | Error::Io(_))
    }
}
