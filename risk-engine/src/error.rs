//! Error types for the risk engine

use thiserror::Error;

/// Result type for risk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Risk engine error
#[derive(Debug, Error)]
pub enum Error {
    /// Ledger read failure
    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger_core::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
