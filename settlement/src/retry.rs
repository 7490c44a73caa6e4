//! Settlement retry scheduler
//!
//! Failed settlements live in a sorted queue keyed by bet ID and scored by
//! their next retry time. Each failure for a bet re-scores the same entry
//! with exponentially growing backoff; the attempt that reaches the retry
//! cap moves the entry to the dead letter store instead. Retrieval pulls
//! only items whose score has passed and orders them high-priority first.

use crate::config::SettlementConfig;
use crate::dead_letter::{DeadLetterItem, DeadLetterStore};
use crate::queue::QueueStore;
use crate::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Queue name for pending settlement retries
pub const RETRY_QUEUE: &str = "settlement:retry";

/// Retry priority; high-priority items are attempted before normal ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Attempted ahead of everything else that is due
    High,
    /// Default priority
    Normal,
}

impl Priority {
    fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Normal => 1,
        }
    }
}

/// One bet awaiting a settlement retry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryItem {
    /// Bet to settle
    pub bet_id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Consecutive failed attempts so far
    pub attempts: u32,

    /// When the most recent attempt failed
    pub last_attempt_at: DateTime<Utc>,

    /// Earliest time the next attempt may run
    pub next_retry_at: DateTime<Utc>,

    /// Most recent failure message
    pub error: String,

    /// Scheduling priority
    pub priority: Priority,

    /// When the item first entered the queue
    pub added_at: DateTime<Utc>,
}

/// Ordering for due items: high priority first, then oldest first
pub fn ready_order(a: &RetryItem, b: &RetryItem) -> Ordering {
    a.priority
        .rank()
        .cmp(&b.priority.rank())
        .then_with(|| a.added_at.cmp(&b.added_at))
}

/// What `enqueue` did with the failure
#[derive(Debug, Clone)]
pub enum EnqueueOutcome {
    /// The item is (re-)scheduled for a future attempt
    Scheduled(RetryItem),
    /// The retry cap was reached; the item moved to the dead letter store
    DeadLettered(DeadLetterItem),
}

/// Snapshot of queue state and lifetime counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    /// Failures enqueued since this scheduler started (includes replays)
    pub total_enqueued: u64,

    /// Items currently waiting in the retry queue
    pub active: u64,

    /// Waiting items whose retry time has passed
    pub ready: u64,

    /// Items currently in the dead letter store
    pub dead_letter: u64,

    /// Items settled and removed since this scheduler started
    pub completed: u64,
}

/// Schedules settlement retries with exponential backoff
pub struct RetryScheduler {
    store: Arc<dyn QueueStore>,
    dead_letter: DeadLetterStore,
    config: SettlementConfig,
    enqueued: AtomicU64,
    completed: AtomicU64,
}

impl RetryScheduler {
    /// Create a scheduler and its dead letter store over one queue store
    pub fn new(store: Arc<dyn QueueStore>, config: SettlementConfig) -> Self {
        let dead_letter = DeadLetterStore::new(store.clone(), config.dead_letter_retention_ms);
        Self {
            store,
            dead_letter,
            config,
            enqueued: AtomicU64::new(0),
            completed: AtomicU64::new(0),
        }
    }

    /// The dead letter store backing this scheduler
    pub fn dead_letter(&self) -> &DeadLetterStore {
        &self.dead_letter
    }

    /// Backoff before attempt `attempts + 1`, capped at the ceiling
    pub fn backoff_ms(&self, attempts: u32) -> u64 {
        let exp = attempts.saturating_sub(1).min(63);
        self.config
            .base_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.config.max_backoff_ms)
    }

    /// Record a settlement failure for a bet
    pub async fn enqueue(
        &self,
        bet_id: Uuid,
        user_id: Uuid,
        error: impl Into<String>,
        priority: Priority,
    ) -> Result<EnqueueOutcome> {
        self.enqueue_at(Utc::now(), bet_id, user_id, error, priority)
            .await
    }

    /// `enqueue` against an explicit clock
    pub async fn enqueue_at(
        &self,
        now: DateTime<Utc>,
        bet_id: Uuid,
        user_id: Uuid,
        error: impl Into<String>,
        priority: Priority,
    ) -> Result<EnqueueOutcome> {
        let error = error.into();
        let key = bet_id.to_string();

        let mut item = match self.store.get(RETRY_QUEUE, &key).await? {
            Some(payload) => {
                let mut item: RetryItem = serde_json::from_str(&payload)?;
                item.attempts += 1;
                item.last_attempt_at = now;
                item.error = error;
                item
            }
            None => {
                // First failure: high priority skips the initial delay
                let next_retry_at = match priority {
                    Priority::High => now,
                    Priority::Normal => {
                        now + Duration::milliseconds(self.config.base_delay_ms as i64)
                    }
                };
                let item = RetryItem {
                    bet_id,
                    user_id,
                    attempts: 1,
                    last_attempt_at: now,
                    next_retry_at,
                    error,
                    priority,
                    added_at: now,
                };
                self.put_item(&item).await?;
                self.enqueued.fetch_add(1, AtomicOrdering::Relaxed);
                info!(
                    bet_id = %bet_id,
                    priority = ?priority,
                    next_retry_at = %item.next_retry_at,
                    "settlement retry scheduled"
                );
                return Ok(EnqueueOutcome::Scheduled(item));
            }
        };

        if item.attempts >= self.config.max_retries {
            let dead = DeadLetterItem::from_retry(item, now);
            self.dead_letter.push(&dead).await?;
            self.store.remove(RETRY_QUEUE, &key).await?;
            return Ok(EnqueueOutcome::DeadLettered(dead));
        }

        let backoff = self.backoff_ms(item.attempts);
        item.next_retry_at = now + Duration::milliseconds(backoff as i64);
        self.put_item(&item).await?;
        debug!(
            bet_id = %bet_id,
            attempts = item.attempts,
            backoff_ms = backoff,
            "settlement retry rescheduled"
        );
        Ok(EnqueueOutcome::Scheduled(item))
    }

    /// Move a failing bet straight to the dead letter store
    ///
    /// For permanent failures, where no amount of backoff can help. Any
    /// queued retry entry is consumed so the two stores stay disjoint.
    pub async fn quarantine(
        &self,
        bet_id: Uuid,
        user_id: Uuid,
        error: impl Into<String>,
    ) -> Result<DeadLetterItem> {
        self.quarantine_at(Utc::now(), bet_id, user_id, error).await
    }

    /// `quarantine` against an explicit clock
    pub async fn quarantine_at(
        &self,
        now: DateTime<Utc>,
        bet_id: Uuid,
        user_id: Uuid,
        error: impl Into<String>,
    ) -> Result<DeadLetterItem> {
        let error = error.into();
        let key = bet_id.to_string();
        let item = match self.store.get(RETRY_QUEUE, &key).await? {
            Some(payload) => {
                let mut item: RetryItem = serde_json::from_str(&payload)?;
                item.attempts += 1;
                item.last_attempt_at = now;
                item.error = error;
                item
            }
            None => RetryItem {
                bet_id,
                user_id,
                attempts: 1,
                last_attempt_at: now,
                next_retry_at: now,
                error,
                priority: Priority::Normal,
                added_at: now,
            },
        };
        let dead = DeadLetterItem::from_retry(item, now);
        self.dead_letter.push(&dead).await?;
        self.store.remove(RETRY_QUEUE, &key).await?;
        Ok(dead)
    }

    /// Items whose retry time has passed, high priority first then oldest
    pub async fn get_ready(&self, limit: usize) -> Result<Vec<RetryItem>> {
        self.get_ready_at(Utc::now(), limit).await
    }

    /// `get_ready` against an explicit clock
    pub async fn get_ready_at(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<RetryItem>> {
        let payloads = self
            .store
            .range_by_score(RETRY_QUEUE, now.timestamp_millis(), limit)
            .await?;
        let mut items = Vec::with_capacity(payloads.len());
        for payload in payloads {
            match serde_json::from_str(&payload) {
                Ok(item) => items.push(item),
                Err(e) => warn!(error = %e, "skipping undecodable retry entry"),
            }
        }
        items.sort_by(ready_order);
        Ok(items)
    }

    /// Fetch a queued item by bet ID
    pub async fn item(&self, bet_id: Uuid) -> Result<Option<RetryItem>> {
        match self.store.get(RETRY_QUEUE, &bet_id.to_string()).await? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Drop a queued item; no-op if it is not queued
    pub async fn remove(&self, bet_id: Uuid) -> Result<bool> {
        self.store.remove(RETRY_QUEUE, &bet_id.to_string()).await
    }

    /// Count a settlement that went through, after its entry is removed
    pub fn mark_completed(&self) {
        self.completed.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Move a dead-lettered bet back into the queue, due immediately
    pub async fn replay_dead_letter(&self, bet_id: Uuid) -> Result<RetryItem> {
        self.replay_dead_letter_at(Utc::now(), bet_id).await
    }

    /// `replay_dead_letter` against an explicit clock
    pub async fn replay_dead_letter_at(
        &self,
        now: DateTime<Utc>,
        bet_id: Uuid,
    ) -> Result<RetryItem> {
        let dead = self.dead_letter.require(bet_id).await?;
        let item = RetryItem {
            bet_id: dead.bet_id,
            user_id: dead.user_id,
            attempts: 1,
            last_attempt_at: now,
            next_retry_at: now,
            error: dead.error,
            priority: Priority::High,
            added_at: now,
        };
        self.put_item(&item).await?;
        self.dead_letter.remove(bet_id).await?;
        self.enqueued.fetch_add(1, AtomicOrdering::Relaxed);
        info!(bet_id = %bet_id, "dead letter item replayed");
        Ok(item)
    }

    /// Queue sizes and lifetime counters
    pub async fn stats(&self) -> Result<QueueStats> {
        self.stats_at(Utc::now()).await
    }

    /// `stats` against an explicit clock
    pub async fn stats_at(&self, now: DateTime<Utc>) -> Result<QueueStats> {
        Ok(QueueStats {
            total_enqueued: self.enqueued.load(AtomicOrdering::Relaxed),
            active: self.store.len(RETRY_QUEUE).await?,
            ready: self
                .store
                .count_below(RETRY_QUEUE, now.timestamp_millis())
                .await?,
            dead_letter: self.dead_letter.len().await?,
            completed: self.completed.load(AtomicOrdering::Relaxed),
        })
    }

    async fn put_item(&self, item: &RetryItem) -> Result<()> {
        let payload = serde_json::to_string(item)?;
        self.store
            .put(
                RETRY_QUEUE,
                &item.bet_id.to_string(),
                item.next_retry_at.timestamp_millis(),
                &payload,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MemoryQueueStore;
    use proptest::prelude::*;

    fn scheduler() -> RetryScheduler {
        RetryScheduler::new(Arc::new(MemoryQueueStore::new()), SettlementConfig::default())
    }

    #[test]
    fn test_backoff_doubles_up_to_the_ceiling() {
        let s = scheduler();
        assert_eq!(s.backoff_ms(1), 60_000);
        assert_eq!(s.backoff_ms(2), 120_000);
        assert_eq!(s.backoff_ms(3), 240_000);
        assert_eq!(s.backoff_ms(4), 480_000);
        assert_eq!(s.backoff_ms(5), 960_000);
        assert_eq!(s.backoff_ms(6), 1_920_000);
        assert_eq!(s.backoff_ms(7), 3_600_000);
        assert_eq!(s.backoff_ms(20), 3_600_000);
    }

    #[test]
    fn test_ready_order_priority_then_age() {
        let now = Utc::now();
        let make = |priority, added_at| RetryItem {
            bet_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            attempts: 1,
            last_attempt_at: now,
            next_retry_at: now,
            error: String::new(),
            priority,
            added_at,
        };
        let old_normal = make(Priority::Normal, now - Duration::hours(1));
        let new_high = make(Priority::High, now);
        let old_high = make(Priority::High, now - Duration::minutes(10));

        let mut items = vec![old_normal.clone(), new_high.clone(), old_high.clone()];
        items.sort_by(ready_order);
        assert_eq!(items[0].bet_id, old_high.bet_id);
        assert_eq!(items[1].bet_id, new_high.bet_id);
        assert_eq!(items[2].bet_id, old_normal.bet_id);
    }

    #[tokio::test]
    async fn test_first_failure_normal_waits_base_delay() {
        let s = scheduler();
        let now = Utc::now();
        let outcome = s
            .enqueue_at(now, Uuid::new_v4(), Uuid::new_v4(), "db down", Priority::Normal)
            .await
            .unwrap();

        let EnqueueOutcome::Scheduled(item) = outcome else {
            panic!("expected scheduled item");
        };
        assert_eq!(item.attempts, 1);
        assert_eq!(item.next_retry_at, now + Duration::milliseconds(60_000));
        // Not visible before its retry time
        assert!(s.get_ready_at(now, 10).await.unwrap().is_empty());
        let later = now + Duration::milliseconds(60_000);
        assert_eq!(s.get_ready_at(later, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_first_failure_high_priority_is_due_immediately() {
        let s = scheduler();
        let now = Utc::now();
        let bet_id = Uuid::new_v4();
        s.enqueue_at(now, bet_id, Uuid::new_v4(), "db down", Priority::High)
            .await
            .unwrap();

        let ready = s.get_ready_at(now, 10).await.unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].bet_id, bet_id);
    }

    #[tokio::test]
    async fn test_repeated_failures_grow_backoff_then_dead_letter() {
        let s = scheduler();
        let bet_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let mut now = Utc::now();

        // Failures 1 through 4 stay in the queue with growing delays
        let mut delays = Vec::new();
        for _ in 0..4 {
            let outcome = s
                .enqueue_at(now, bet_id, user_id, "db down", Priority::Normal)
                .await
                .unwrap();
            let EnqueueOutcome::Scheduled(item) = outcome else {
                panic!("expected scheduled item");
            };
            delays.push((item.next_retry_at - now).num_milliseconds());
            now = item.next_retry_at;
        }
        assert_eq!(delays, vec![60_000, 120_000, 240_000, 480_000]);

        // The fifth consecutive failure exhausts the cap
        let outcome = s
            .enqueue_at(now, bet_id, user_id, "db still down", Priority::Normal)
            .await
            .unwrap();
        let EnqueueOutcome::DeadLettered(dead) = outcome else {
            panic!("expected dead letter");
        };
        assert_eq!(dead.attempts, 5);
        assert_eq!(dead.error, "db still down");
        assert!(s.item(bet_id).await.unwrap().is_none());
        assert!(s.dead_letter().get(bet_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let s = scheduler();
        let bet_id = Uuid::new_v4();
        s.enqueue(bet_id, Uuid::new_v4(), "x", Priority::Normal)
            .await
            .unwrap();

        assert!(s.remove(bet_id).await.unwrap());
        assert!(!s.remove(bet_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_replay_resets_attempts_and_is_due_now() {
        let s = scheduler();
        let bet_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let mut now = Utc::now();
        for _ in 0..5 {
            match s
                .enqueue_at(now, bet_id, user_id, "db down", Priority::Normal)
                .await
                .unwrap()
            {
                EnqueueOutcome::Scheduled(item) => now = item.next_retry_at,
                EnqueueOutcome::DeadLettered(_) => {}
            }
        }
        assert!(s.dead_letter().get(bet_id).await.unwrap().is_some());

        let item = s.replay_dead_letter_at(now, bet_id).await.unwrap();
        assert_eq!(item.attempts, 1);
        assert_eq!(item.priority, Priority::High);
        assert_eq!(item.next_retry_at, now);
        assert!(s.dead_letter().get(bet_id).await.unwrap().is_none());
        assert_eq!(s.get_ready_at(now, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_quarantine_consumes_the_retry_entry() {
        let s = scheduler();
        let bet_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        s.enqueue_at(now, bet_id, user_id, "db down", Priority::Normal)
            .await
            .unwrap();

        let dead = s
            .quarantine_at(now, bet_id, user_id, "bet row missing")
            .await
            .unwrap();
        assert_eq!(dead.attempts, 2);
        assert_eq!(dead.error, "bet row missing");
        assert!(s.item(bet_id).await.unwrap().is_none());
        assert!(s.dead_letter().get(bet_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_quarantine_without_prior_retries() {
        let s = scheduler();
        let bet_id = Uuid::new_v4();
        let dead = s
            .quarantine(bet_id, Uuid::new_v4(), "unserializable payload")
            .await
            .unwrap();
        assert_eq!(dead.attempts, 1);
        assert!(s.dead_letter().get(bet_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_replay_missing_item_is_not_found() {
        let s = scheduler();
        let err = s.replay_dead_letter(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, crate::SettlementError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_stats_reflect_queue_state() {
        let s = scheduler();
        let now = Utc::now();
        let due = Uuid::new_v4();
        s.enqueue_at(now, due, Uuid::new_v4(), "x", Priority::High)
            .await
            .unwrap();
        s.enqueue_at(now, Uuid::new_v4(), Uuid::new_v4(), "y", Priority::Normal)
            .await
            .unwrap();

        let stats = s.stats_at(now).await.unwrap();
        assert_eq!(stats.total_enqueued, 2);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.ready, 1);
        assert_eq!(stats.dead_letter, 0);
        assert_eq!(stats.completed, 0);

        s.remove(due).await.unwrap();
        s.mark_completed();
        let stats = s.stats_at(now).await.unwrap();
        assert_eq!(stats.active, 1);
        assert_eq!(stats.completed, 1);
    }

    proptest! {
        #[test]
        fn prop_backoff_doubles_until_the_ceiling(attempts in 1u32..1000) {
            let s = scheduler();
            let backoff = s.backoff_ms(attempts);
            prop_assert!(backoff >= s.config.base_delay_ms);
            prop_assert!(backoff <= s.config.max_backoff_ms);

            let next = s.backoff_ms(attempts + 1);
            if next < s.config.max_backoff_ms {
                prop_assert_eq!(next, backoff * 2);
            } else {
                prop_assert!(next >= backoff);
            }
        }
    }
}
