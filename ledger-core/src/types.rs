//! Core types for the betting ledger
//!
//! All types are designed for:
//! - Exact arithmetic (integer minor units for money, Decimal for odds)
//! - Serde round-tripping (queue payloads, config, admin views)
//! - Single pending -> terminal lifecycle per bet

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Bet composition type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetType {
    /// One selection
    Single,
    /// Multiple selections, all must win
    Express,
    /// Combination of expresses over the selections
    System,
}

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BetType::Single => "single",
            BetType::Express => "express",
            BetType::System => "system",
        };
        write!(f, "{}", s)
    }
}

/// Bet lifecycle status
///
/// The only legal transitions are `Pending` -> `Won` | `Lost` | `Void`.
/// Terminal statuses are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    /// Placed, awaiting settlement
    Pending,
    /// Settled as a win (terminal)
    Won,
    /// Settled as a loss (terminal)
    Lost,
    /// Voided, stake refunded (terminal)
    Void,
}

impl BetStatus {
    /// Check whether the status is terminal
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BetStatus::Pending)
    }
}

impl fmt::Display for BetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BetStatus::Pending => "pending",
            BetStatus::Won => "won",
            BetStatus::Lost => "lost",
            BetStatus::Void => "void",
        };
        write!(f, "{}", s)
    }
}

/// Final outcome applied to a pending bet by the settlement engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetOutcome {
    /// Bet won, full potential winnings credited
    Won,
    /// Bet lost, no balance change
    Lost,
    /// Fixture voided, stake refunded
    Void,
}

impl BetOutcome {
    /// Terminal status this outcome resolves to
    pub fn status(&self) -> BetStatus {
        match self {
            BetOutcome::Won => BetStatus::Won,
            BetOutcome::Lost => BetStatus::Lost,
            BetOutcome::Void => BetStatus::Void,
        }
    }
}

impl fmt::Display for BetOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status())
    }
}

/// A user's wager, composed of one or more selections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    /// Unique bet ID
    pub id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Composition type
    pub bet_type: BetType,

    /// Stake in minor currency units
    pub total_stake_cents: i64,

    /// round(stake * total_odds), fixed at placement
    pub potential_winnings_cents: i64,

    /// Product of all selection odds
    pub total_odds: Decimal,

    /// Lifecycle status
    pub status: BetStatus,

    /// Credited winnings; None until settled
    pub actual_winnings_cents: Option<i64>,

    /// Placement timestamp
    pub placed_at: DateTime<Utc>,

    /// Settlement timestamp; None while pending
    pub settled_at: Option<DateTime<Utc>>,
}

impl Bet {
    /// Liability carried while pending: payout minus stake
    pub fn liability_cents(&self) -> i64 {
        self.potential_winnings_cents - self.total_stake_cents
    }
}

/// One leg of a bet: a market outcome on a fixture at fixed odds
///
/// Owned exclusively by its bet; created together with it, never
/// independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selection {
    /// Unique selection ID
    pub id: Uuid,

    /// Owning bet
    pub bet_id: Uuid,

    /// Fixture the selection is on
    pub fixture_id: Uuid,

    /// Market name (e.g. "match_winner", "total_goals")
    pub market: String,

    /// Selected outcome within the market
    pub selection: String,

    /// Odds at placement time
    pub odds: Decimal,

    /// Mirrors the bet outcome at settlement
    pub status: BetStatus,
}

/// Ledger transaction classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Stake debit at placement
    BetStake,
    /// Winnings credit at settlement
    BetPayout,
    /// Stake refund on a voided bet
    BetRefund,
}

/// Append-only ledger entry
///
/// Invariant: `balance_after_cents = balance_before_cents + amount_cents`,
/// and a user's balance always equals the cumulative sum of their entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction ID
    pub id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Classification
    pub tx_type: TransactionType,

    /// Signed amount in minor units (debits negative)
    pub amount_cents: i64,

    /// Balance before applying this entry
    pub balance_before_cents: i64,

    /// Balance after applying this entry
    pub balance_after_cents: i64,

    /// Related entity, usually a bet ID
    pub reference: Option<Uuid>,

    /// Human-readable description
    pub description: String,

    /// Entry timestamp
    pub created_at: DateTime<Utc>,
}

/// User account with a monetary balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Owning user
    pub user_id: Uuid,

    /// Current balance in minor units
    pub balance_cents: i64,

    /// Inactive accounts cannot place bets
    pub active: bool,
}

impl Account {
    /// Create an active account with an opening balance
    pub fn new(user_id: Uuid, balance_cents: i64) -> Self {
        Self {
            user_id,
            balance_cents,
            active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminality() {
        assert!(!BetStatus::Pending.is_terminal());
        assert!(BetStatus::Won.is_terminal());
        assert!(BetStatus::Lost.is_terminal());
        assert!(BetStatus::Void.is_terminal());
    }

    #[test]
    fn test_outcome_maps_to_terminal_status() {
        assert_eq!(BetOutcome::Won.status(), BetStatus::Won);
        assert_eq!(BetOutcome::Lost.status(), BetStatus::Lost);
        assert_eq!(BetOutcome::Void.status(), BetStatus::Void);
        assert!(BetOutcome::Won.status().is_terminal());
    }

    #[test]
    fn test_bet_liability() {
        let bet = Bet {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            bet_type: BetType::Single,
            total_stake_cents: 2_000,
            potential_winnings_cents: 5_000,
            total_odds: Decimal::new(250, 2),
            status: BetStatus::Pending,
            actual_winnings_cents: None,
            placed_at: Utc::now(),
            settled_at: None,
        };

        assert_eq!(bet.liability_cents(), 3_000);
    }

    #[test]
    fn test_status_serde_lowercase() {
        let json = serde_json::to_string(&BetStatus::Pending).unwrap();
        assert_eq!(json, "\"pending\"");

        let status: BetStatus = serde_json::from_str("\"void\"").unwrap();
        assert_eq!(status, BetStatus::Void);
    }
}
