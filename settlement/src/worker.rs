//! Settlement worker
//!
//! Drives settlements end to end: applies outcomes through the engine,
//! hands failures to the retry scheduler, and runs the polling loop that
//! picks due retries back up. The loop is a spawned task with a watch
//! channel for clean shutdown.

use crate::config::SettlementConfig;
use crate::engine::SettlementEngine;
use crate::retry::{Priority, RetryItem, RetryScheduler};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledger_core::types::BetOutcome;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Source of match results for bets awaiting settlement
///
/// `None` means the result is not known yet; the worker treats that as a
/// failed attempt and the bet goes back on the retry queue.
#[async_trait]
pub trait ResultSource: Send + Sync {
    /// Outcome for a bet, if one has been decided
    async fn outcome(&self, bet_id: Uuid) -> Result<Option<BetOutcome>>;
}

/// What one drain pass did
#[derive(Debug, Clone, Copy, Default)]
pub struct DrainReport {
    /// Bets settled (or found already settled) this pass
    pub settled: u64,
    /// Bets pushed back with a later retry time
    pub rescheduled: u64,
    /// Bets that exhausted their retries this pass
    pub dead_lettered: u64,
}

/// Applies outcomes and retries failed settlements
pub struct SettlementWorker {
    engine: SettlementEngine,
    scheduler: Arc<RetryScheduler>,
    results: Arc<dyn ResultSource>,
    config: SettlementConfig,
}

impl SettlementWorker {
    /// Create a worker
    pub fn new(
        engine: SettlementEngine,
        scheduler: Arc<RetryScheduler>,
        results: Arc<dyn ResultSource>,
        config: SettlementConfig,
    ) -> Self {
        Self {
            engine,
            scheduler,
            results,
            config,
        }
    }

    /// The retry scheduler this worker feeds
    pub fn scheduler(&self) -> &Arc<RetryScheduler> {
        &self.scheduler
    }

    /// Apply a known outcome to a bet, queueing a retry on failure
    ///
    /// Returns whether the bet is settled after the call. A bet that was
    /// already terminal counts as settled; nothing is re-applied.
    pub async fn apply_outcome(
        &self,
        bet_id: Uuid,
        user_id: Uuid,
        outcome: BetOutcome,
        priority: Priority,
    ) -> Result<bool> {
        match self.engine.settle_bet(bet_id, outcome).await {
            Ok(_) => {
                if self.scheduler.remove(bet_id).await? {
                    debug!(bet_id = %bet_id, "retry entry cleared after settlement");
                }
                self.scheduler.mark_completed();
                Ok(true)
            }
            Err(e) if e.is_already_settled() => {
                // Another worker got there first
                self.scheduler.remove(bet_id).await?;
                self.scheduler.mark_completed();
                Ok(true)
            }
            Err(e) if e.is_transient() => {
                warn!(bet_id = %bet_id, error = %e, "settlement failed, scheduling retry");
                self.scheduler
                    .enqueue(bet_id, user_id, e.to_string(), priority)
                    .await?;
                Ok(false)
            }
            Err(e) => {
                error!(bet_id = %bet_id, error = %e, "permanent settlement failure");
                self.scheduler
                    .quarantine(bet_id, user_id, e.to_string())
                    .await?;
                Ok(false)
            }
        }
    }

    /// One polling pass: purge expired dead letters, pull due retries, run them
    pub async fn drain_due(&self) -> Result<DrainReport> {
        self.drain_due_at(Utc::now()).await
    }

    /// `drain_due` against an explicit clock
    pub async fn drain_due_at(&self, now: DateTime<Utc>) -> Result<DrainReport> {
        self.scheduler.dead_letter().purge_expired_at(now).await?;

        let due = self.scheduler.get_ready_at(now, self.config.batch_limit).await?;
        let mut report = DrainReport::default();
        for item in due {
            match self.process_item(now, &item).await {
                Ok(ItemResult::Settled) => report.settled += 1,
                Ok(ItemResult::Rescheduled) => report.rescheduled += 1,
                Ok(ItemResult::DeadLettered) => report.dead_lettered += 1,
                Err(e) => error!(bet_id = %item.bet_id, error = %e, "retry processing failed"),
            }
        }
        if report.settled + report.rescheduled + report.dead_lettered > 0 {
            info!(
                settled = report.settled,
                rescheduled = report.rescheduled,
                dead_lettered = report.dead_lettered,
                "retry queue drained"
            );
        }
        Ok(report)
    }

    async fn process_item(&self, now: DateTime<Utc>, item: &RetryItem) -> Result<ItemResult> {
        let attempt = match self.results.outcome(item.bet_id).await {
            Ok(Some(outcome)) => self.engine.settle_bet(item.bet_id, outcome).await.map(|_| ()),
            Ok(None) => Err(crate::SettlementError::NotFound(format!(
                "no result yet for bet {}",
                item.bet_id
            ))),
            Err(e) => Err(e),
        };

        match attempt {
            Ok(()) => {
                self.scheduler.remove(item.bet_id).await?;
                self.scheduler.mark_completed();
                Ok(ItemResult::Settled)
            }
            Err(e) if e.is_already_settled() => {
                self.scheduler.remove(item.bet_id).await?;
                self.scheduler.mark_completed();
                Ok(ItemResult::Settled)
            }
            Err(e) if e.is_transient() => {
                let outcome = self
                    .scheduler
                    .enqueue_at(now, item.bet_id, item.user_id, e.to_string(), item.priority)
                    .await?;
                match outcome {
                    crate::retry::EnqueueOutcome::Scheduled(_) => Ok(ItemResult::Rescheduled),
                    crate::retry::EnqueueOutcome::DeadLettered(_) => Ok(ItemResult::DeadLettered),
                }
            }
            Err(e) => {
                error!(bet_id = %item.bet_id, error = %e, "permanent settlement failure");
                self.scheduler
                    .quarantine_at(now, item.bet_id, item.user_id, e.to_string())
                    .await?;
                Ok(ItemResult::DeadLettered)
            }
        }
    }

    /// Run the polling loop until the handle is shut down
    pub fn spawn(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            info!(poll_interval_ms = self.config.poll_interval_ms, "settlement worker started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.drain_due().await {
                            error!(error = %e, "drain pass failed");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        info!("settlement worker stopping");
                        break;
                    }
                }
            }
        });
        WorkerHandle {
            shutdown: shutdown_tx,
            handle,
        }
    }
}

enum ItemResult {
    Settled,
    Rescheduled,
    DeadLettered,
}

/// Handle to a running worker task
pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal the loop to stop and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}
