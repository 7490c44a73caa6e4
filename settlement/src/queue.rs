//! Sorted-queue storage abstraction
//!
//! A queue is a score-ordered index over string keys plus a per-key payload
//! record (the Redis sorted-set + hash layout). All retrieval and expiry go
//! through score-range queries; nothing ever scans every key.

use crate::Result;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

/// Score-ordered key/payload store backing the retry and dead letter queues
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Insert or overwrite an entry; an existing key is re-scored
    async fn put(&self, queue: &str, key: &str, score: i64, payload: &str) -> Result<()>;

    /// Fetch a payload by key
    async fn get(&self, queue: &str, key: &str) -> Result<Option<String>>;

    /// Delete an entry; returns whether it existed
    async fn remove(&self, queue: &str, key: &str) -> Result<bool>;

    /// Payloads with `score <= max_score`, ascending by score, capped at `limit`
    async fn range_by_score(&self, queue: &str, max_score: i64, limit: usize) -> Result<Vec<String>>;

    /// Payloads ordered by descending score, capped at `limit`
    async fn rev_range(&self, queue: &str, limit: usize) -> Result<Vec<String>>;

    /// Delete all entries with `score <= max_score`; returns how many
    async fn remove_range_by_score(&self, queue: &str, max_score: i64) -> Result<u64>;

    /// Number of entries with `score <= max_score`
    async fn count_below(&self, queue: &str, max_score: i64) -> Result<u64>;

    /// Total number of entries
    async fn len(&self, queue: &str) -> Result<u64>;
}

#[derive(Default)]
struct QueueInner {
    // (score, key) index plus key -> score back-reference
    by_score: BTreeSet<(i64, String)>,
    scores: HashMap<String, i64>,
    payloads: HashMap<String, String>,
}

impl QueueInner {
    fn put(&mut self, key: &str, score: i64, payload: &str) {
        if let Some(old) = self.scores.insert(key.to_string(), score) {
            self.by_score.remove(&(old, key.to_string()));
        }
        self.by_score.insert((score, key.to_string()));
        self.payloads.insert(key.to_string(), payload.to_string());
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.scores.remove(key) {
            Some(score) => {
                self.by_score.remove(&(score, key.to_string()));
                self.payloads.remove(key);
                true
            }
            None => false,
        }
    }
}

/// In-memory queue store for tests and single-node deployments
#[derive(Default)]
pub struct MemoryQueueStore {
    queues: RwLock<HashMap<String, QueueInner>>,
}

impl MemoryQueueStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn put(&self, queue: &str, key: &str, score: i64, payload: &str) -> Result<()> {
        let mut queues = self.queues.write().await;
        queues.entry(queue.to_string()).or_default().put(key, score, payload);
        Ok(())
    }

    async fn get(&self, queue: &str, key: &str) -> Result<Option<String>> {
        let queues = self.queues.read().await;
        Ok(queues
            .get(queue)
            .and_then(|q| q.payloads.get(key))
            .cloned())
    }

    async fn remove(&self, queue: &str, key: &str) -> Result<bool> {
        let mut queues = self.queues.write().await;
        Ok(queues.get_mut(queue).is_some_and(|q| q.remove(key)))
    }

    async fn range_by_score(&self, queue: &str, max_score: i64, limit: usize) -> Result<Vec<String>> {
        let queues = self.queues.read().await;
        let Some(q) = queues.get(queue) else {
            return Ok(Vec::new());
        };
        Ok(q.by_score
            .range(..=(max_score, String::from('\u{10FFFF}')))
            .take(limit)
            .filter_map(|(_, key)| q.payloads.get(key))
            .cloned()
            .collect())
    }

    async fn rev_range(&self, queue: &str, limit: usize) -> Result<Vec<String>> {
        let queues = self.queues.read().await;
        let Some(q) = queues.get(queue) else {
            return Ok(Vec::new());
        };
        Ok(q.by_score
            .iter()
            .rev()
            .take(limit)
            .filter_map(|(_, key)| q.payloads.get(key))
            .cloned()
            .collect())
    }

    async fn remove_range_by_score(&self, queue: &str, max_score: i64) -> Result<u64> {
        let mut queues = self.queues.write().await;
        let Some(q) = queues.get_mut(queue) else {
            return Ok(0);
        };
        let expired: Vec<String> = q
            .by_score
            .range(..=(max_score, String::from('\u{10FFFF}')))
            .map(|(_, key)| key.clone())
            .collect();
        for key in &expired {
            q.remove(key);
        }
        Ok(expired.len() as u64)
    }

    async fn count_below(&self, queue: &str, max_score: i64) -> Result<u64> {
        let queues = self.queues.read().await;
        let Some(q) = queues.get(queue) else {
            return Ok(0);
        };
        Ok(q.by_score
            .range(..=(max_score, String::from('\u{10FFFF}')))
            .count() as u64)
    }

    async fn len(&self, queue: &str) -> Result<u64> {
        let queues = self.queues.read().await;
        Ok(queues.get(queue).map(|q| q.scores.len() as u64).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_overwrites_score_and_payload() {
        let store = MemoryQueueStore::new();
        store.put("q", "a", 100, "first").await.unwrap();
        store.put("q", "a", 50, "second").await.unwrap();

        assert_eq!(store.len("q").await.unwrap(), 1);
        assert_eq!(store.get("q", "a").await.unwrap().unwrap(), "second");
        assert_eq!(store.count_below("q", 50).await.unwrap(), 1);
        // The old score entry is gone
        assert_eq!(store.count_below("q", 99).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_range_by_score_ascending_with_limit() {
        let store = MemoryQueueStore::new();
        store.put("q", "late", 300, "late").await.unwrap();
        store.put("q", "early", 100, "early").await.unwrap();
        store.put("q", "mid", 200, "mid").await.unwrap();

        let due = store.range_by_score("q", 250, 10).await.unwrap();
        assert_eq!(due, vec!["early".to_string(), "mid".to_string()]);

        let capped = store.range_by_score("q", 250, 1).await.unwrap();
        assert_eq!(capped, vec!["early".to_string()]);
    }

    #[tokio::test]
    async fn test_rev_range_most_recent_first() {
        let store = MemoryQueueStore::new();
        store.put("q", "a", 100, "a").await.unwrap();
        store.put("q", "b", 200, "b").await.unwrap();
        store.put("q", "c", 300, "c").await.unwrap();

        let items = store.rev_range("q", 2).await.unwrap();
        assert_eq!(items, vec!["c".to_string(), "b".to_string()]);
        // Zero limit means zero rows, on every backend
        assert!(store.rev_range("q", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = MemoryQueueStore::new();
        store.put("q", "a", 100, "a").await.unwrap();

        assert!(store.remove("q", "a").await.unwrap());
        assert!(!store.remove("q", "a").await.unwrap());
        assert!(!store.remove("missing", "a").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_range_by_score() {
        let store = MemoryQueueStore::new();
        for (key, score) in [("a", 100), ("b", 200), ("c", 300)] {
            store.put("q", key, score, key).await.unwrap();
        }

        let purged = store.remove_range_by_score("q", 200).await.unwrap();
        assert_eq!(purged, 2);
        assert_eq!(store.len("q").await.unwrap(), 1);
        assert!(store.get("q", "a").await.unwrap().is_none());
        assert!(store.get("q", "c").await.unwrap().is_some());
    }
}
