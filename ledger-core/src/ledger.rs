//! Ledger writer: atomic bet placement
//!
//! Validates a placement request, prices it (total odds, potential
//! winnings), and hands the whole unit to the store, which commits bet,
//! selections, stake debit, and transaction atomically.

use crate::config::LedgerConfig;
use crate::store::{LedgerStore, PlacementReceipt};
use crate::types::{Bet, BetStatus, BetType, Selection};
use crate::{Error, Result};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// One requested leg of a bet
#[derive(Debug, Clone)]
pub struct SelectionRequest {
    /// Fixture the selection is on
    pub fixture_id: Uuid,
    /// Market name
    pub market: String,
    /// Selected outcome within the market
    pub selection: String,
    /// Odds as quoted to the user, e.g. "2.50"
    pub odds: String,
}

/// A bet placement request
#[derive(Debug, Clone)]
pub struct PlaceBetRequest {
    /// Composition type
    pub bet_type: BetType,
    /// Requested legs, one or more
    pub selections: Vec<SelectionRequest>,
    /// Stake in minor currency units
    pub stake_cents: i64,
}

/// Ledger writer
pub struct LedgerWriter {
    store: Arc<dyn LedgerStore>,
    config: LedgerConfig,
}

impl LedgerWriter {
    /// Create a writer over a store
    pub fn new(store: Arc<dyn LedgerStore>, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    /// Place a bet: all-or-nothing
    ///
    /// On success the stake is debited and the pending bet, its selections,
    /// and the debit transaction are committed together. On any error no
    /// partial state is observable.
    pub async fn place_bet(
        &self,
        user_id: Uuid,
        request: PlaceBetRequest,
    ) -> Result<PlacementReceipt> {
        self.validate_shape(&request)?;

        let odds = parse_odds(&request.selections)?;
        let total_odds = total_odds(&odds);
        if total_odds < self.config.min_total_odds || total_odds > self.config.max_total_odds {
            return Err(Error::InvalidOdds(format!(
                "total odds {} outside [{}, {}]",
                total_odds, self.config.min_total_odds, self.config.max_total_odds
            )));
        }

        let potential = potential_winnings_cents(request.stake_cents, total_odds)?;

        let bet_id = Uuid::new_v4();
        let bet = Bet {
            id: bet_id,
            user_id,
            bet_type: request.bet_type,
            total_stake_cents: request.stake_cents,
            potential_winnings_cents: potential,
            total_odds,
            status: BetStatus::Pending,
            actual_winnings_cents: None,
            placed_at: Utc::now(),
            settled_at: None,
        };

        let selections: Vec<Selection> = request
            .selections
            .into_iter()
            .zip(odds)
            .map(|(req, odds)| Selection {
                id: Uuid::new_v4(),
                bet_id,
                fixture_id: req.fixture_id,
                market: req.market,
                selection: req.selection,
                odds,
                status: BetStatus::Pending,
            })
            .collect();

        let receipt = self.store.place_bet(bet, selections).await?;

        info!(
            bet_id = %bet_id,
            user_id = %user_id,
            total_odds = %total_odds,
            stake_cents = receipt.bet.total_stake_cents,
            potential_winnings_cents = potential,
            "bet placed"
        );

        Ok(receipt)
    }

    fn validate_shape(&self, request: &PlaceBetRequest) -> Result<()> {
        if request.stake_cents <= 0 {
            return Err(Error::Validation(format!(
                "stake must be a positive minor-unit amount, got {}",
                request.stake_cents
            )));
        }

        if request.selections.is_empty() {
            return Err(Error::Validation("bet has no selections".to_string()));
        }

        if request.selections.len() > self.config.max_selections {
            return Err(Error::Validation(format!(
                "too many selections: {} > {}",
                request.selections.len(),
                self.config.max_selections
            )));
        }

        match request.bet_type {
            BetType::Single if request.selections.len() != 1 => Err(Error::Validation(
                "single bet must have exactly one selection".to_string(),
            )),
            BetType::Express | BetType::System if request.selections.len() < 2 => {
                Err(Error::Validation(format!(
                    "{} bet requires at least two selections",
                    request.bet_type
                )))
            }
            _ => Ok(()),
        }
    }
}

fn parse_odds(selections: &[SelectionRequest]) -> Result<Vec<Decimal>> {
    selections
        .iter()
        .map(|s| {
            let odds = Decimal::from_str(&s.odds)
                .map_err(|e| Error::InvalidOdds(format!("'{}': {}", s.odds, e)))?;
            if odds <= Decimal::ZERO {
                return Err(Error::InvalidOdds(format!("'{}': not positive", s.odds)));
            }
            Ok(odds)
        })
        .collect()
}

/// Product of per-selection odds
pub fn total_odds(odds: &[Decimal]) -> Decimal {
    odds.iter().product()
}

/// round(stake * total_odds), half away from zero
pub fn potential_winnings_cents(stake_cents: i64, total_odds: Decimal) -> Result<i64> {
    let winnings = (Decimal::from(stake_cents) * total_odds)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    winnings.to_i64().ok_or_else(|| {
        Error::Validation(format!("potential winnings overflow: {}", winnings))
    })
}
