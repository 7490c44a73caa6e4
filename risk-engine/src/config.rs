//! Configuration for the risk engine

use serde::{Deserialize, Serialize};

/// Exposure monitoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Total-exposure threshold the risk bands are measured against (cents)
    pub exposure_threshold_cents: i64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            exposure_threshold_cents: 100_000_000, // 1M in major units
        }
    }
}

impl RiskConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::InvalidConfig(e.to_string()))?;
        let config: RiskConfig = toml::from_str(&content)
            .map_err(|e| crate::Error::InvalidConfig(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load defaults overridden by environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = RiskConfig::default();

        if let Ok(cents) = std::env::var("RISK_EXPOSURE_THRESHOLD_CENTS") {
            config.exposure_threshold_cents = cents.parse().map_err(|e| {
                crate::Error::InvalidConfig(format!("RISK_EXPOSURE_THRESHOLD_CENTS: {}", e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> crate::Result<()> {
        if self.exposure_threshold_cents <= 0 {
            return Err(crate::Error::InvalidConfig(
                "exposure_threshold_cents must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
