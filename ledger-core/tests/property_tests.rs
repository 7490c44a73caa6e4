//! Property-based tests for ledger invariants
//!
//! - Balance always equals the cumulative sum of the transaction ledger
//! - Placement is all-or-nothing: a rejected placement changes nothing
//! - Settlement credits match the payout policy exactly once

use ledger_core::{
    Account, BetOutcome, BetType, LedgerConfig, LedgerStore, LedgerWriter, MemoryLedgerStore,
    PlaceBetRequest, SelectionRequest,
};
use proptest::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

/// Strategy for stakes in minor units
fn stake_strategy() -> impl Strategy<Value = i64> {
    100i64..500_000
}

/// Strategy for odds quoted with two decimal places in [1.01, 50.00]
fn odds_strategy() -> impl Strategy<Value = String> {
    (101u32..5_000).prop_map(|basis| format!("{}.{:02}", basis / 100, basis % 100))
}

fn outcome_strategy() -> impl Strategy<Value = BetOutcome> {
    prop_oneof![
        Just(BetOutcome::Won),
        Just(BetOutcome::Lost),
        Just(BetOutcome::Void),
    ]
}

fn request(odds: String, stake_cents: i64) -> PlaceBetRequest {
    PlaceBetRequest {
        bet_type: BetType::Single,
        selections: vec![SelectionRequest {
            fixture_id: Uuid::new_v4(),
            market: "match_winner".to_string(),
            selection: "home".to_string(),
            odds,
        }],
        stake_cents,
    }
}

/// Ledger sum: opening balance plus all signed amounts
async fn ledger_balance(store: &MemoryLedgerStore, user_id: Uuid, opening: i64) -> i64 {
    let txs = store.transactions(user_id).await.unwrap();
    opening + txs.iter().map(|t| t.amount_cents).sum::<i64>()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: after any accepted placement, balance drops by exactly the
    /// stake and the ledger sum still equals the account balance.
    #[test]
    fn prop_placement_conserves_ledger(stake in stake_strategy(), odds in odds_strategy()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = Arc::new(MemoryLedgerStore::new());
            let user_id = Uuid::new_v4();
            let opening = 1_000_000i64;
            store.insert_account(Account::new(user_id, opening)).await;
            let writer = LedgerWriter::new(store.clone(), LedgerConfig::default());

            let receipt = writer.place_bet(user_id, request(odds, stake)).await.unwrap();

            prop_assert_eq!(receipt.balance_cents, opening - stake);
            let balance = store.account(user_id).await.unwrap().balance_cents;
            prop_assert_eq!(balance, ledger_balance(&store, user_id, opening).await);
            Ok(())
        })?;
    }

    /// Property: a placement rejected for insufficient funds leaves the
    /// account, ledger, and bet table untouched.
    #[test]
    fn prop_rejected_placement_is_invisible(short in 1i64..10_000, odds in odds_strategy()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = Arc::new(MemoryLedgerStore::new());
            let user_id = Uuid::new_v4();
            let stake = 50_000i64;
            let opening = stake - short;
            store.insert_account(Account::new(user_id, opening)).await;
            let writer = LedgerWriter::new(store.clone(), LedgerConfig::default());

            let result = writer.place_bet(user_id, request(odds, stake)).await;

            prop_assert!(result.is_err());
            prop_assert_eq!(store.account(user_id).await.unwrap().balance_cents, opening);
            prop_assert!(store.transactions(user_id).await.unwrap().is_empty());
            prop_assert!(store.pending_bets().await.unwrap().is_empty());
            Ok(())
        })?;
    }

    /// Property: place-then-settle applies the payout policy and keeps the
    /// ledger sum equal to the balance; a second settle changes nothing.
    #[test]
    fn prop_settlement_conserves_ledger(
        stake in stake_strategy(),
        odds in odds_strategy(),
        outcome in outcome_strategy(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = Arc::new(MemoryLedgerStore::new());
            let user_id = Uuid::new_v4();
            let opening = 1_000_000i64;
            store.insert_account(Account::new(user_id, opening)).await;
            let writer = LedgerWriter::new(store.clone(), LedgerConfig::default());

            let placed = writer.place_bet(user_id, request(odds, stake)).await.unwrap();
            let bet = placed.bet;

            let expected_credit = match outcome {
                BetOutcome::Won => bet.potential_winnings_cents,
                BetOutcome::Lost => 0,
                BetOutcome::Void => bet.total_stake_cents,
            };

            let receipt = store.settle_bet(bet.id, outcome, expected_credit).await.unwrap();
            prop_assert_eq!(receipt.balance_cents, opening - stake + expected_credit);
            prop_assert_eq!(receipt.bet.actual_winnings_cents, Some(expected_credit));

            let balance = store.account(user_id).await.unwrap().balance_cents;
            prop_assert_eq!(balance, ledger_balance(&store, user_id, opening).await);

            // Double settlement is rejected and moves no money
            let second = store.settle_bet(bet.id, BetOutcome::Won, bet.potential_winnings_cents).await;
            prop_assert!(second.is_err());
            prop_assert_eq!(store.account(user_id).await.unwrap().balance_cents, balance);
            Ok(())
        })?;
    }
}
