//! Standalone settlement worker demo
//!
//! Runs the full pipeline against in-memory stores: places a bet, serves its
//! result through a source that fails the first attempts, and lets the
//! polling worker retry until the bet settles.

use async_trait::async_trait;
use ledger_core::config::LedgerConfig;
use ledger_core::ledger::{LedgerWriter, PlaceBetRequest, SelectionRequest};
use ledger_core::store::{LedgerStore, MemoryLedgerStore};
use ledger_core::types::{Account, BetOutcome, BetType};
use settlement::{
    MemoryQueueStore, Priority, ResultSource, RetryScheduler, SettlementConfig, SettlementEngine,
    SettlementWorker,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Serves a fixed outcome, but only after a few failed lookups
struct FlakyResults {
    outcome: BetOutcome,
    failures_left: AtomicU32,
}

#[async_trait]
impl ResultSource for FlakyResults {
    async fn outcome(&self, _bet_id: Uuid) -> settlement::Result<Option<BetOutcome>> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(settlement::SettlementError::Queue(
                "result feed unavailable".to_string(),
            ));
        }
        Ok(Some(self.outcome))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let store = Arc::new(MemoryLedgerStore::new());
    let user_id = Uuid::new_v4();
    store.insert_account(Account::new(user_id, 10_000)).await;

    let writer = LedgerWriter::new(store.clone(), LedgerConfig::default());
    let receipt = writer
        .place_bet(
            user_id,
            PlaceBetRequest {
                bet_type: BetType::Single,
                stake_cents: 2_000,
                selections: vec![SelectionRequest {
                    fixture_id: Uuid::new_v4(),
                    market: "match_winner".to_string(),
                    selection: "home".to_string(),
                    odds: "2.50".to_string(),
                }],
            },
        )
        .await?;
    info!(
        bet_id = %receipt.bet.id,
        stake_cents = receipt.bet.total_stake_cents,
        balance_cents = receipt.balance_cents,
        "bet placed"
    );

    // Poll fast and retry fast so the demo finishes in seconds
    let config = SettlementConfig {
        poll_interval_ms: 200,
        base_delay_ms: 300,
        ..SettlementConfig::default()
    };
    let scheduler = Arc::new(RetryScheduler::new(
        Arc::new(MemoryQueueStore::new()),
        config.clone(),
    ));
    let results = Arc::new(FlakyResults {
        outcome: BetOutcome::Won,
        failures_left: AtomicU32::new(2),
    });
    let worker = SettlementWorker::new(
        SettlementEngine::new(store.clone()),
        scheduler.clone(),
        results,
        config,
    );

    // The result is not available yet; park the bet on the retry queue and
    // let the worker loop pick it up
    scheduler
        .enqueue(receipt.bet.id, user_id, "result feed unavailable", Priority::High)
        .await?;
    let handle = worker.spawn();

    loop {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        let bet = store.bet(receipt.bet.id).await?;
        if bet.status.is_terminal() {
            info!(
                status = %bet.status,
                winnings_cents = bet.actual_winnings_cents.unwrap_or(0),
                balance_cents = store.account(user_id).await?.balance_cents,
                "bet settled after retries"
            );
            break;
        }
    }

    let stats = scheduler.stats().await?;
    info!(
        total_enqueued = stats.total_enqueued,
        completed = stats.completed,
        dead_letter = stats.dead_letter,
        "final queue stats"
    );

    handle.shutdown().await;
    Ok(())
}
