//! Configuration for the settlement subsystem

use serde::{Deserialize, Serialize};

/// Settlement and retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Failures after which an item is dead-lettered
    pub max_retries: u32,

    /// First retry delay for normal-priority items (ms)
    pub base_delay_ms: u64,

    /// Backoff ceiling (ms)
    pub max_backoff_ms: u64,

    /// Polling loop tick (ms)
    pub poll_interval_ms: u64,

    /// Max due items pulled per tick
    pub batch_limit: usize,

    /// Dead letter retention window (ms)
    pub dead_letter_retention_ms: i64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 60_000,                        // 1 minute
            max_backoff_ms: 3_600_000,                    // 1 hour
            poll_interval_ms: 5_000,                      // 5 seconds
            batch_limit: 50,
            dead_letter_retention_ms: 7 * 24 * 3_600_000, // 7 days
        }
    }
}

impl SettlementConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::SettlementError::Config(e.to_string()))?;
        let config: SettlementConfig = toml::from_str(&content)
            .map_err(|e| crate::SettlementError::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load defaults overridden by environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = SettlementConfig::default();

        if let Ok(n) = std::env::var("SETTLEMENT_MAX_RETRIES") {
            config.max_retries = n
                .parse()
                .map_err(|e| crate::SettlementError::Config(format!("SETTLEMENT_MAX_RETRIES: {}", e)))?;
        }

        if let Ok(ms) = std::env::var("SETTLEMENT_BASE_DELAY_MS") {
            config.base_delay_ms = ms
                .parse()
                .map_err(|e| crate::SettlementError::Config(format!("SETTLEMENT_BASE_DELAY_MS: {}", e)))?;
        }

        if let Ok(ms) = std::env::var("SETTLEMENT_POLL_INTERVAL_MS") {
            config.poll_interval_ms = ms
                .parse()
                .map_err(|e| crate::SettlementError::Config(format!("SETTLEMENT_POLL_INTERVAL_MS: {}", e)))?;
        }

        Ok(config)
    }
}
