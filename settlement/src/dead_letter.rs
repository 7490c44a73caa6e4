//! Dead letter store
//!
//! Holding area for bets that exhausted automatic retries. Same score/data
//! layout as the retry queue, scored by the time the item was moved, so
//! listing is a reverse range and retention expiry is a score-range delete.
//! Items leave only by expiry or by manual replay through the scheduler.

use crate::queue::QueueStore;
use crate::retry::{Priority, RetryItem};
use crate::{Result, SettlementError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Queue name for dead-lettered settlement items
pub const DEAD_LETTER_QUEUE: &str = "settlement:dead_letter";

/// A retry item that ran out of attempts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterItem {
    /// Bet awaiting manual intervention
    pub bet_id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Attempts consumed before giving up
    pub attempts: u32,

    /// When the last attempt ran
    pub last_attempt_at: DateTime<Utc>,

    /// Retry time that was scheduled when the item died
    pub next_retry_at: DateTime<Utc>,

    /// Last failure message
    pub error: String,

    /// Priority the item carried in the active queue
    pub priority: Priority,

    /// When the item first entered the retry queue
    pub added_at: DateTime<Utc>,

    /// When the item was moved here
    pub moved_at: DateTime<Utc>,
}

impl DeadLetterItem {
    /// Capture a retry item at the moment it is moved
    pub fn from_retry(item: RetryItem, moved_at: DateTime<Utc>) -> Self {
        Self {
            bet_id: item.bet_id,
            user_id: item.user_id,
            attempts: item.attempts,
            last_attempt_at: item.last_attempt_at,
            next_retry_at: item.next_retry_at,
            error: item.error,
            priority: item.priority,
            added_at: item.added_at,
            moved_at,
        }
    }
}

/// Dead letter store over a sorted queue
pub struct DeadLetterStore {
    store: Arc<dyn QueueStore>,
    retention_ms: i64,
}

impl DeadLetterStore {
    /// Create a store with a retention window
    pub fn new(store: Arc<dyn QueueStore>, retention_ms: i64) -> Self {
        Self { store, retention_ms }
    }

    /// Record a dead-lettered item, scored by `moved_at`
    pub async fn push(&self, item: &DeadLetterItem) -> Result<()> {
        let payload = serde_json::to_string(item)?;
        self.store
            .put(
                DEAD_LETTER_QUEUE,
                &item.bet_id.to_string(),
                item.moved_at.timestamp_millis(),
                &payload,
            )
            .await?;
        warn!(
            bet_id = %item.bet_id,
            attempts = item.attempts,
            error = %item.error,
            "settlement moved to dead letter"
        );
        Ok(())
    }

    /// Fetch an item by bet ID
    pub async fn get(&self, bet_id: Uuid) -> Result<Option<DeadLetterItem>> {
        match self.store.get(DEAD_LETTER_QUEUE, &bet_id.to_string()).await? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Most recently moved items first
    pub async fn list(&self, limit: usize) -> Result<Vec<DeadLetterItem>> {
        let payloads = self.store.rev_range(DEAD_LETTER_QUEUE, limit).await?;
        let mut items = Vec::with_capacity(payloads.len());
        for payload in payloads {
            match serde_json::from_str(&payload) {
                Ok(item) => items.push(item),
                Err(e) => warn!(error = %e, "skipping undecodable dead letter entry"),
            }
        }
        Ok(items)
    }

    /// Delete an item; no-op if absent
    pub async fn remove(&self, bet_id: Uuid) -> Result<bool> {
        self.store
            .remove(DEAD_LETTER_QUEUE, &bet_id.to_string())
            .await
    }

    /// Delete entries older than the retention window
    pub async fn purge_expired(&self) -> Result<u64> {
        self.purge_expired_at(Utc::now()).await
    }

    /// Retention sweep against an explicit clock
    pub async fn purge_expired_at(&self, now: DateTime<Utc>) -> Result<u64> {
        let cutoff = now.timestamp_millis() - self.retention_ms;
        let purged = self
            .store
            .remove_range_by_score(DEAD_LETTER_QUEUE, cutoff)
            .await?;
        if purged > 0 {
            info!(purged, "expired dead letter entries purged");
        }
        Ok(purged)
    }

    /// Number of dead-lettered items
    pub async fn len(&self) -> Result<u64> {
        self.store.len(DEAD_LETTER_QUEUE).await
    }

    /// Fetch an item or fail with `NotFound`
    pub(crate) async fn require(&self, bet_id: Uuid) -> Result<DeadLetterItem> {
        self.get(bet_id)
            .await?
            .ok_or_else(|| SettlementError::NotFound(format!("dead letter item {}", bet_id)))
    }
}
