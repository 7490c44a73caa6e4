//! Settlement engine
//!
//! Computes the payout for an outcome and applies it through the ledger's
//! conditional update. A bet that is no longer pending is rejected by the
//! ledger, which is what keeps concurrent workers from paying out twice.

use crate::Result;
use ledger_core::store::{LedgerStore, SettlementReceipt};
use ledger_core::types::{Bet, BetOutcome};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Payout credited to the user for an outcome, in cents
pub fn payout_cents(bet: &Bet, outcome: BetOutcome) -> i64 {
    match outcome {
        BetOutcome::Won => bet.potential_winnings_cents,
        BetOutcome::Lost => 0,
        BetOutcome::Void => bet.total_stake_cents,
    }
}

/// Applies bet outcomes to the ledger
pub struct SettlementEngine {
    store: Arc<dyn LedgerStore>,
}

impl SettlementEngine {
    /// Create an engine over a ledger store
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// The backing ledger store
    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Settle a pending bet with an outcome
    ///
    /// Fails with `AlreadySettled` (wrapped in `Ledger`) if the bet is
    /// already terminal; callers treat that as success elsewhere.
    pub async fn settle_bet(&self, bet_id: Uuid, outcome: BetOutcome) -> Result<SettlementReceipt> {
        let bet = self.store.bet(bet_id).await?;
        let payout = payout_cents(&bet, outcome);
        let receipt = self.store.settle_bet(bet_id, outcome, payout).await?;
        info!(
            bet_id = %bet_id,
            outcome = %outcome,
            payout_cents = payout,
            "bet settled"
        );
        Ok(receipt)
    }
}
