//! # Settlement
//!
//! Settlement reliability layer for the bet ledger:
//!
//! - **Engine**: computes payouts and applies outcomes through the ledger's
//!   conditional update, so a bet settles at most once
//! - **Retry scheduler**: failed settlements wait in a sorted queue with
//!   exponential backoff; exhausted items move to the dead letter store
//! - **Dead letter store**: holds exhausted items for inspection and manual
//!   replay, purged after a retention window
//! - **Worker**: the polling task that drains due retries and applies results
//!
//! Queues run on any [`queue::QueueStore`]; an in-memory store backs tests
//! and single-node runs, Redis sorted sets back distributed deployments.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod dead_letter;
pub mod engine;
pub mod error;
pub mod queue;
pub mod redis_queue;
pub mod retry;
pub mod worker;

pub use config::SettlementConfig;
pub use dead_letter::{DeadLetterItem, DeadLetterStore, DEAD_LETTER_QUEUE};
pub use engine::{payout_cents, SettlementEngine};
pub use error::{Result, SettlementError};
pub use queue::{MemoryQueueStore, QueueStore};
pub use redis_queue::RedisQueueStore;
pub use retry::{ready_order, EnqueueOutcome, Priority, QueueStats, RetryItem, RetryScheduler, RETRY_QUEUE};
pub use worker::{DrainReport, ResultSource, SettlementWorker, WorkerHandle};
