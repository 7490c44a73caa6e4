//! Error types for the settlement subsystem

use thiserror::Error;

/// Result type for settlement operations
pub type Result<T> = std::result::Result<T, SettlementError>;

/// Settlement errors
#[derive(Error, Debug)]
pub enum SettlementError {
    /// Ledger-level failure (validation, funds, conditional update, storage)
    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger_core::Error),

    /// Queue store failure (retryable)
    #[error("Queue error: {0}")]
    Queue(String),

    /// Entity missing from a queue
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SettlementError {
    /// Whether the bet is already terminal (the no-op rejection path)
    pub fn is_already_settled(&self) -> bool {
        matches!(
            self,
            SettlementError::Ledger(ledger_core::Error::AlreadySettled { .. })
        )
    }

    /// Whether a retry can plausibly succeed
    ///
    /// Queue failures and missing results clear up on their own; ledger
    /// errors defer to the ledger's own classification. Everything else is
    /// permanent and goes straight to the dead letter store.
    pub fn is_transient(&self) -> bool {
        match self {
            SettlementError::Ledger(e) => e.is_transient(),
            SettlementError::Queue(_) | SettlementError::NotFound(_) => true,
            SettlementError::Serialization(_)
            | SettlementError::Config(_)
            | SettlementError::Internal(_) => false,
        }
    }
}
