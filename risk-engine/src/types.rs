//! Core types for the risk engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Risk level for an exposure figure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Below 25% of the exposure threshold
    Low,
    /// Below 50% of the exposure threshold
    Medium,
    /// Below 75% of the exposure threshold
    High,
    /// At or above 75% of the exposure threshold
    Critical,
}

impl RiskLevel {
    /// Classify an exposure against a threshold
    pub fn classify(exposure_cents: i64, threshold_cents: i64) -> Self {
        // threshold is validated positive at config load
        let quarters = exposure_cents.saturating_mul(4) / threshold_cents.max(1);
        match quarters {
            0 => RiskLevel::Low,
            1 => RiskLevel::Medium,
            2 => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }
}

/// Open liability attributed to one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserExposure {
    /// User the exposure belongs to
    pub user_id: Uuid,

    /// Number of pending bets
    pub pending_bets: u64,

    /// Total stake committed across pending bets
    pub total_stake_cents: i64,

    /// Worst-case payout minus stake across pending bets
    pub liability_cents: i64,

    /// Classification against the configured threshold
    pub risk_level: RiskLevel,
}

/// Open liability attributed to one market
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketExposure {
    /// Market name, e.g. "match_winner"
    pub market: String,

    /// Number of pending bets touching this market
    pub pending_bets: u64,

    /// Worst-case payout minus stake attributed to this market
    pub liability_cents: i64,

    /// Classification against the configured threshold
    pub risk_level: RiskLevel,
}

/// Point-in-time exposure snapshot across all pending bets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureReport {
    /// Total worst-case liability across all pending bets
    pub total_liability_cents: i64,

    /// Classification of the total against the configured threshold
    pub risk_level: RiskLevel,

    /// Per-user breakdown, largest liability first
    pub by_user: Vec<UserExposure>,

    /// Per-market breakdown, largest liability first
    pub by_market: Vec<MarketExposure>,

    /// When the snapshot was taken
    pub generated_at: DateTime<Utc>,
}
