//! Redis-backed queue store
//!
//! Each queue is a sorted set (the score index) plus a hash keyed
//! `<queue>:data` (the payload records). Due-item retrieval uses
//! ZRANGEBYSCORE with a LIMIT and retention sweeps use ZREMRANGEBYSCORE,
//! so no operation touches more keys than it returns.

use crate::queue::QueueStore;
use crate::{Result, SettlementError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;

fn data_key(queue: &str) -> String {
    format!("{}:data", queue)
}

fn queue_err(e: redis::RedisError) -> SettlementError {
    SettlementError::Queue(e.to_string())
}

/// Queue store over Redis sorted sets
#[derive(Clone)]
pub struct RedisQueueStore {
    redis: ConnectionManager,
}

impl RedisQueueStore {
    /// Wrap an existing connection manager
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    /// Connect to a Redis URL
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(queue_err)?;
        let redis = ConnectionManager::new(client).await.map_err(queue_err)?;
        Ok(Self { redis })
    }

    async fn payloads_for(&self, queue: &str, keys: Vec<String>) -> Result<Vec<String>> {
        let mut payloads = Vec::with_capacity(keys.len());
        for key in keys {
            let payload: Option<String> = self
                .redis
                .clone()
                .hget(data_key(queue), &key)
                .await
                .map_err(queue_err)?;
            match payload {
                Some(p) => payloads.push(p),
                // Score entry without a record: index and data drifted
                None => warn!(queue, key = %key, "queue entry has no payload record"),
            }
        }
        Ok(payloads)
    }
}

#[async_trait]
impl QueueStore for RedisQueueStore {
    async fn put(&self, queue: &str, key: &str, score: i64, payload: &str) -> Result<()> {
        let mut conn = self.redis.clone();
        let _: () = conn.zadd(queue, key, score).await.map_err(queue_err)?;
        let _: () = conn
            .hset(data_key(queue), key, payload)
            .await
            .map_err(queue_err)?;
        Ok(())
    }

    async fn get(&self, queue: &str, key: &str) -> Result<Option<String>> {
        self.redis
            .clone()
            .hget(data_key(queue), key)
            .await
            .map_err(queue_err)
    }

    async fn remove(&self, queue: &str, key: &str) -> Result<bool> {
        let mut conn = self.redis.clone();
        let removed: u64 = conn.zrem(queue, key).await.map_err(queue_err)?;
        let _: () = conn.hdel(data_key(queue), key).await.map_err(queue_err)?;
        Ok(removed > 0)
    }

    async fn range_by_score(&self, queue: &str, max_score: i64, limit: usize) -> Result<Vec<String>> {
        let keys: Vec<String> = self
            .redis
            .clone()
            .zrangebyscore_limit(queue, "-inf", max_score, 0, limit as isize)
            .await
            .map_err(queue_err)?;
        self.payloads_for(queue, keys).await
    }

    async fn rev_range(&self, queue: &str, limit: usize) -> Result<Vec<String>> {
        // ZREVRANGE q 0 -1 would return everything
        if limit == 0 {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = self
            .redis
            .clone()
            .zrevrange(queue, 0, limit as isize - 1)
            .await
            .map_err(queue_err)?;
        self.payloads_for(queue, keys).await
    }

    async fn remove_range_by_score(&self, queue: &str, max_score: i64) -> Result<u64> {
        let mut conn = self.redis.clone();
        let keys: Vec<String> = conn
            .zrangebyscore(queue, "-inf", max_score)
            .await
            .map_err(queue_err)?;
        if keys.is_empty() {
            return Ok(0);
        }
        let removed: u64 = conn
            .zrembyscore(queue, "-inf", max_score)
            .await
            .map_err(queue_err)?;
        let _: () = conn
            .hdel(data_key(queue), &keys)
            .await
            .map_err(queue_err)?;
        Ok(removed)
    }

    async fn count_below(&self, queue: &str, max_score: i64) -> Result<u64> {
        self.redis
            .clone()
            .zcount(queue, "-inf", max_score)
            .await
            .map_err(queue_err)
    }

    async fn len(&self, queue: &str) -> Result<u64> {
        self.redis.clone().zcard(queue).await.map_err(queue_err)
    }
}
