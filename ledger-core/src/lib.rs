//! BetLedger Core
//!
//! Atomic bet placement over an append-only transaction ledger.
//!
//! # Architecture
//!
//! - **Unit-of-work writes**: bet + selections + balance + transaction
//!   commit together or not at all
//! - **Conditional settlement**: pending -> terminal transitions are
//!   enforced in the store, never read-then-write
//! - **Swappable storage**: everything goes through the [`LedgerStore`]
//!   trait; [`MemoryLedgerStore`] backs tests and single-node use
//!
//! # Invariants
//!
//! - A user's balance equals the cumulative sum of their transactions
//! - A stake is never debited without a matching pending bet, and vice versa
//! - A bet reaches exactly one terminal status, exactly once

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod ledger;
pub mod store;
pub mod types;

// Re-exports
pub use config::LedgerConfig;
pub use error::{Error, Result};
pub use ledger::{LedgerWriter, PlaceBetRequest, SelectionRequest};
pub use store::{LedgerStore, MemoryLedgerStore, PlacementReceipt, SettlementReceipt};
pub use types::{
    Account, Bet, BetOutcome, BetStatus, BetType, Selection, Transaction, TransactionType,
};
