//! Exposure aggregation over pending bets
//!
//! Read-only view: walks the ledger's pending bets and rolls worst-case
//! liability up by user and by market. A multi-leg bet touching several
//! markets contributes its full liability to each of them, so per-market
//! figures overlap and do not sum to the total.

use crate::config::RiskConfig;
use crate::types::{ExposureReport, MarketExposure, RiskLevel, UserExposure};
use crate::Result;
use chrono::{DateTime, Utc};
use ledger_core::store::LedgerStore;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct UserAccum {
    pending_bets: u64,
    total_stake_cents: i64,
    liability_cents: i64,
}

#[derive(Default)]
struct MarketAccum {
    pending_bets: u64,
    liability_cents: i64,
}

/// Aggregates open liability from the ledger's pending bets
pub struct ExposureAggregator {
    store: Arc<dyn LedgerStore>,
    config: RiskConfig,
}

impl ExposureAggregator {
    /// Create an aggregator over a ledger store
    pub fn new(store: Arc<dyn LedgerStore>, config: RiskConfig) -> Self {
        Self { store, config }
    }

    /// Snapshot exposure across all pending bets
    pub async fn report(&self) -> Result<ExposureReport> {
        self.report_at(Utc::now()).await
    }

    /// `report` against an explicit clock
    pub async fn report_at(&self, now: DateTime<Utc>) -> Result<ExposureReport> {
        let pending = self.store.pending_bets().await?;
        debug!(pending_bets = pending.len(), "aggregating exposure");

        let threshold = self.config.exposure_threshold_cents;
        let mut total_liability_cents = 0i64;
        let mut users: HashMap<Uuid, UserAccum> = HashMap::new();
        let mut markets: HashMap<String, MarketAccum> = HashMap::new();

        for bet in &pending {
            let liability = bet.liability_cents();
            total_liability_cents += liability;

            let user = users.entry(bet.user_id).or_default();
            user.pending_bets += 1;
            user.total_stake_cents += bet.total_stake_cents;
            user.liability_cents += liability;

            // One entry per distinct market the bet touches
            let mut seen: HashSet<String> = HashSet::new();
            for selection in self.store.selections(bet.id).await? {
                if !seen.insert(selection.market.clone()) {
                    continue;
                }
                let market = markets.entry(selection.market).or_default();
                market.pending_bets += 1;
                market.liability_cents += liability;
            }
        }

        let mut by_user: Vec<UserExposure> = users
            .into_iter()
            .map(|(user_id, a)| UserExposure {
                user_id,
                pending_bets: a.pending_bets,
                total_stake_cents: a.total_stake_cents,
                liability_cents: a.liability_cents,
                risk_level: RiskLevel::classify(a.liability_cents, threshold),
            })
            .collect();
        by_user.sort_by(|a, b| b.liability_cents.cmp(&a.liability_cents));

        let mut by_market: Vec<MarketExposure> = markets
            .into_iter()
            .map(|(market, a)| MarketExposure {
                market,
                pending_bets: a.pending_bets,
                liability_cents: a.liability_cents,
                risk_level: RiskLevel::classify(a.liability_cents, threshold),
            })
            .collect();
        by_market.sort_by(|a, b| b.liability_cents.cmp(&a.liability_cents));

        Ok(ExposureReport {
            total_liability_cents,
            risk_level: RiskLevel::classify(total_liability_cents, threshold),
            by_user,
            by_market,
            generated_at: now,
        })
    }
}
