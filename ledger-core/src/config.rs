//! Configuration for the ledger writer

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Lower bound on the product of selection odds
    pub min_total_odds: Decimal,

    /// Upper bound on the product of selection odds
    pub max_total_odds: Decimal,

    /// Maximum number of selections per bet
    pub max_selections: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            min_total_odds: Decimal::new(101, 2),   // 1.01
            max_total_odds: Decimal::new(10_000, 0),
            max_selections: 20,
        }
    }
}

impl LedgerConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LedgerConfig = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load defaults overridden by environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = LedgerConfig::default();

        if let Ok(odds) = std::env::var("LEDGER_MIN_TOTAL_ODDS") {
            config.min_total_odds = Decimal::from_str(&odds)
                .map_err(|e| crate::Error::Config(format!("LEDGER_MIN_TOTAL_ODDS: {}", e)))?;
        }

        if let Ok(odds) = std::env::var("LEDGER_MAX_TOTAL_ODDS") {
            config.max_total_odds = Decimal::from_str(&odds)
                .map_err(|e| crate::Error::Config(format!("LEDGER_MAX_TOTAL_ODDS: {}", e)))?;
        }

        if let Ok(n) = std::env::var("LEDGER_MAX_SELECTIONS") {
            config.max_selections = n
                .parse()
                .map_err(|e| crate::Error::Config(format!("LEDGER_MAX_SELECTIONS: {}", e)))?;
        }

        Ok(config)
    }
}
