//! # Risk Engine
//!
//! Exposure monitoring over the bet ledger. Reads pending bets, rolls
//! worst-case liability up per user and per market, and classifies each
//! figure against a configured exposure threshold. Owns no state of its
//! own; everything here is derived from the ledger.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod exposure;
pub mod types;

pub use config::RiskConfig;
pub use error::{Error, Result};
pub use exposure::ExposureAggregator;
pub use types::{ExposureReport, MarketExposure, RiskLevel, UserExposure};
