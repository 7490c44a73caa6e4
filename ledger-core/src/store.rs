//! Storage abstraction for the betting ledger
//!
//! `LedgerStore` is the seam between the ledger/settlement logic and the
//! relational backing store. The two mutating operations are units of work:
//!
//! - `place_bet`: bet + selections + stake debit + transaction, all or nothing
//! - `settle_bet`: conditional pending -> terminal update plus credit,
//!   rejected outright if the bet already left `pending`
//!
//! `MemoryLedgerStore` applies each unit under a single write lock and
//! validates before mutating, so a failed call is never partially visible
//! and per-user balance mutations are serialized.

use crate::types::{Account, Bet, BetOutcome, BetStatus, Selection, Transaction, TransactionType};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Everything committed by a successful placement
#[derive(Debug, Clone)]
pub struct PlacementReceipt {
    /// The pending bet row
    pub bet: Bet,
    /// Its selections
    pub selections: Vec<Selection>,
    /// The stake debit entry
    pub transaction: Transaction,
    /// Balance after the debit
    pub balance_cents: i64,
}

/// Everything committed by a successful settlement
#[derive(Debug, Clone)]
pub struct SettlementReceipt {
    /// The bet in its terminal state
    pub bet: Bet,
    /// Credit entry; None when the settlement moved no money (lost)
    pub transaction: Option<Transaction>,
    /// Balance after the credit, if any
    pub balance_cents: i64,
}

/// Relational store interface for bets, selections, transactions, accounts
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Fetch an account
    async fn account(&self, user_id: Uuid) -> Result<Account>;

    /// Commit a placement as one atomic unit
    ///
    /// Verifies the account is active and sufficiently funded, debits the
    /// stake, and writes the bet, its selections, and the debit transaction.
    /// On any failure nothing is committed.
    async fn place_bet(&self, bet: Bet, selections: Vec<Selection>) -> Result<PlacementReceipt>;

    /// Commit a settlement as one atomic unit, only if the bet is pending
    ///
    /// Sets status, `actual_winnings_cents`, and `settled_at`; credits
    /// `actual_winnings_cents` and writes the credit transaction when the
    /// amount is positive. Rejects with [`Error::AlreadySettled`] if the bet
    /// is no longer pending. This conditional update is the idempotency
    /// guard against double settlement across concurrent workers.
    async fn settle_bet(
        &self,
        bet_id: Uuid,
        outcome: BetOutcome,
        actual_winnings_cents: i64,
    ) -> Result<SettlementReceipt>;

    /// Fetch a bet
    async fn bet(&self, bet_id: Uuid) -> Result<Bet>;

    /// Fetch the selections of a bet
    async fn selections(&self, bet_id: Uuid) -> Result<Vec<Selection>>;

    /// All bets currently pending, across users
    async fn pending_bets(&self) -> Result<Vec<Bet>>;

    /// A user's transactions, oldest first
    async fn transactions(&self, user_id: Uuid) -> Result<Vec<Transaction>>;
}

#[derive(Default)]
struct StoreInner {
    accounts: HashMap<Uuid, Account>,
    bets: HashMap<Uuid, Bet>,
    selections: HashMap<Uuid, Vec<Selection>>,
    transactions: HashMap<Uuid, Vec<Transaction>>,
}

/// In-memory ledger store for tests and single-node deployments
#[derive(Default)]
pub struct MemoryLedgerStore {
    inner: RwLock<StoreInner>,
}

impl MemoryLedgerStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an account
    pub async fn insert_account(&self, account: Account) {
        self.inner.write().await.accounts.insert(account.user_id, account);
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn account(&self, user_id: Uuid) -> Result<Account> {
        self.inner
            .read()
            .await
            .accounts
            .get(&user_id)
            .cloned()
            .ok_or(Error::UserNotFound(user_id))
    }

    async fn place_bet(&self, bet: Bet, selections: Vec<Selection>) -> Result<PlacementReceipt> {
        let mut inner = self.inner.write().await;

        // Validate everything before touching state
        let account = inner
            .accounts
            .get(&bet.user_id)
            .ok_or(Error::UserNotFound(bet.user_id))?;

        if !account.active {
            return Err(Error::AccountInactive(bet.user_id));
        }

        if bet.status != BetStatus::Pending {
            return Err(Error::Validation(format!(
                "placement requires a pending bet, got {}",
                bet.status
            )));
        }

        let stake = bet.total_stake_cents;
        let balance_before = account.balance_cents;
        if balance_before < stake {
            return Err(Error::InsufficientFunds {
                required: stake,
                available: balance_before,
            });
        }

        let balance_after = balance_before - stake;
        let transaction = Transaction {
            id: Uuid::new_v4(),
            user_id: bet.user_id,
            tx_type: TransactionType::BetStake,
            amount_cents: -stake,
            balance_before_cents: balance_before,
            balance_after_cents: balance_after,
            reference: Some(bet.id),
            description: format!("Stake for {} bet {}", bet.bet_type, bet.id),
            created_at: Utc::now(),
        };

        // Commit the whole unit
        if let Some(account) = inner.accounts.get_mut(&bet.user_id) {
            account.balance_cents = balance_after;
        }
        inner.bets.insert(bet.id, bet.clone());
        inner.selections.insert(bet.id, selections.clone());
        inner
            .transactions
            .entry(bet.user_id)
            .or_default()
            .push(transaction.clone());

        debug!(
            bet_id = %bet.id,
            user_id = %bet.user_id,
            stake_cents = stake,
            balance_cents = balance_after,
            "placement committed"
        );

        Ok(PlacementReceipt {
            bet,
            selections,
            transaction,
            balance_cents: balance_after,
        })
    }

    async fn settle_bet(
        &self,
        bet_id: Uuid,
        outcome: BetOutcome,
        actual_winnings_cents: i64,
    ) -> Result<SettlementReceipt> {
        let mut inner = self.inner.write().await;

        let current = inner.bets.get(&bet_id).ok_or(Error::BetNotFound(bet_id))?;
        if current.status != BetStatus::Pending {
            return Err(Error::AlreadySettled {
                bet_id,
                status: current.status,
            });
        }

        let user_id = current.user_id;
        let balance_before = inner
            .accounts
            .get(&user_id)
            .ok_or(Error::UserNotFound(user_id))?
            .balance_cents;

        let status = outcome.status();
        let credit = actual_winnings_cents;
        let now = Utc::now();

        let transaction = if credit > 0 {
            let tx_type = match outcome {
                BetOutcome::Void => TransactionType::BetRefund,
                _ => TransactionType::BetPayout,
            };
            Some(Transaction {
                id: Uuid::new_v4(),
                user_id,
                tx_type,
                amount_cents: credit,
                balance_before_cents: balance_before,
                balance_after_cents: balance_before + credit,
                reference: Some(bet_id),
                description: format!("Settlement ({}) of bet {}", status, bet_id),
                created_at: now,
            })
        } else {
            None
        };
        let balance_after = balance_before + credit.max(0);

        // Commit the whole unit
        if let Some(bet) = inner.bets.get_mut(&bet_id) {
            bet.status = status;
            bet.actual_winnings_cents = Some(actual_winnings_cents);
            bet.settled_at = Some(now);
        }
        if let Some(selections) = inner.selections.get_mut(&bet_id) {
            for selection in selections.iter_mut() {
                selection.status = status;
            }
        }
        if let Some(tx) = &transaction {
            if let Some(account) = inner.accounts.get_mut(&user_id) {
                account.balance_cents = balance_after;
            }
            inner.transactions.entry(user_id).or_default().push(tx.clone());
        }

        let bet = inner
            .bets
            .get(&bet_id)
            .cloned()
            .ok_or(Error::BetNotFound(bet_id))?;

        info!(
            bet_id = %bet_id,
            user_id = %user_id,
            status = %status,
            credit_cents = credit,
            balance_cents = balance_after,
            "settlement committed"
        );

        Ok(SettlementReceipt {
            bet,
            transaction,
            balance_cents: balance_after,
        })
    }

    async fn bet(&self, bet_id: Uuid) -> Result<Bet> {
        self.inner
            .read()
            .await
            .bets
            .get(&bet_id)
            .cloned()
            .ok_or(Error::BetNotFound(bet_id))
    }

    async fn selections(&self, bet_id: Uuid) -> Result<Vec<Selection>> {
        Ok(self
            .inner
            .read()
            .await
            .selections
            .get(&bet_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn pending_bets(&self) -> Result<Vec<Bet>> {
        Ok(self
            .inner
            .read()
            .await
            .bets
            .values()
            .filter(|b| b.status == BetStatus::Pending)
            .cloned()
            .collect())
    }

    async fn transactions(&self, user_id: Uuid) -> Result<Vec<Transaction>> {
        Ok(self
            .inner
            .read()
            .await
            .transactions
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BetType;
    use rust_decimal::Decimal;

    fn pending_bet(user_id: Uuid, stake: i64, potential: i64) -> Bet {
        Bet {
            id: Uuid::new_v4(),
            user_id,
            bet_type: BetType::Single,
            total_stake_cents: stake,
            potential_winnings_cents: potential,
            total_odds: Decimal::new(250, 2),
            status: BetStatus::Pending,
            actual_winnings_cents: None,
            placed_at: Utc::now(),
            settled_at: None,
        }
    }

    #[tokio::test]
    async fn test_placement_debits_and_records() {
        let store = MemoryLedgerStore::new();
        let user_id = Uuid::new_v4();
        store.insert_account(Account::new(user_id, 10_000)).await;

        let bet = pending_bet(user_id, 2_000, 5_000);
        let receipt = store.place_bet(bet.clone(), vec![]).await.unwrap();

        assert_eq!(receipt.balance_cents, 8_000);
        assert_eq!(receipt.transaction.amount_cents, -2_000);
        assert_eq!(receipt.transaction.balance_after_cents, 8_000);
        assert_eq!(store.bet(bet.id).await.unwrap().status, BetStatus::Pending);
    }

    #[tokio::test]
    async fn test_placement_insufficient_funds_leaves_no_state() {
        let store = MemoryLedgerStore::new();
        let user_id = Uuid::new_v4();
        store.insert_account(Account::new(user_id, 1_000)).await;

        let bet = pending_bet(user_id, 2_000, 5_000);
        let err = store.place_bet(bet.clone(), vec![]).await.unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { .. }));

        // Nothing observable: no bet, no transaction, balance untouched
        assert!(matches!(
            store.bet(bet.id).await.unwrap_err(),
            Error::BetNotFound(_)
        ));
        assert!(store.transactions(user_id).await.unwrap().is_empty());
        assert_eq!(store.account(user_id).await.unwrap().balance_cents, 1_000);
    }

    #[tokio::test]
    async fn test_placement_inactive_account_rejected() {
        let store = MemoryLedgerStore::new();
        let user_id = Uuid::new_v4();
        let mut account = Account::new(user_id, 10_000);
        account.active = false;
        store.insert_account(account).await;

        let err = store
            .place_bet(pending_bet(user_id, 1_000, 2_000), vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccountInactive(_)));
    }

    #[tokio::test]
    async fn test_settle_is_conditional_on_pending() {
        let store = MemoryLedgerStore::new();
        let user_id = Uuid::new_v4();
        store.insert_account(Account::new(user_id, 10_000)).await;

        let bet = pending_bet(user_id, 2_000, 5_000);
        store.place_bet(bet.clone(), vec![]).await.unwrap();

        let receipt = store
            .settle_bet(bet.id, BetOutcome::Won, 5_000)
            .await
            .unwrap();
        assert_eq!(receipt.balance_cents, 13_000);
        assert_eq!(receipt.bet.status, BetStatus::Won);
        assert_eq!(receipt.bet.actual_winnings_cents, Some(5_000));

        // Second attempt is rejected and moves no money
        let err = store
            .settle_bet(bet.id, BetOutcome::Won, 5_000)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadySettled { .. }));
        assert_eq!(store.account(user_id).await.unwrap().balance_cents, 13_000);
    }

    #[tokio::test]
    async fn test_settle_lost_writes_no_transaction() {
        let store = MemoryLedgerStore::new();
        let user_id = Uuid::new_v4();
        store.insert_account(Account::new(user_id, 10_000)).await;

        let bet = pending_bet(user_id, 2_000, 5_000);
        store.place_bet(bet.clone(), vec![]).await.unwrap();

        let receipt = store.settle_bet(bet.id, BetOutcome::Lost, 0).await.unwrap();
        assert!(receipt.transaction.is_none());
        assert_eq!(receipt.balance_cents, 8_000);
        assert_eq!(receipt.bet.actual_winnings_cents, Some(0));

        // Only the stake debit is on the ledger
        assert_eq!(store.transactions(user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_settle_void_refunds_stake() {
        let store = MemoryLedgerStore::new();
        let user_id = Uuid::new_v4();
        store.insert_account(Account::new(user_id, 10_000)).await;

        let bet = pending_bet(user_id, 2_000, 5_000);
        store.place_bet(bet.clone(), vec![]).await.unwrap();

        let receipt = store
            .settle_bet(bet.id, BetOutcome::Void, 2_000)
            .await
            .unwrap();
        assert_eq!(receipt.balance_cents, 10_000);
        let tx = receipt.transaction.unwrap();
        assert_eq!(tx.tx_type, TransactionType::BetRefund);
        assert_eq!(tx.amount_cents, 2_000);
    }

    #[tokio::test]
    async fn test_selections_mirror_settlement_status() {
        let store = MemoryLedgerStore::new();
        let user_id = Uuid::new_v4();
        store.insert_account(Account::new(user_id, 10_000)).await;

        let bet = pending_bet(user_id, 2_000, 5_000);
        let selection = Selection {
            id: Uuid::new_v4(),
            bet_id: bet.id,
            fixture_id: Uuid::new_v4(),
            market: "match_winner".to_string(),
            selection: "home".to_string(),
            odds: Decimal::new(250, 2),
            status: BetStatus::Pending,
        };
        store.place_bet(bet.clone(), vec![selection]).await.unwrap();

        store.settle_bet(bet.id, BetOutcome::Won, 5_000).await.unwrap();

        let selections = store.selections(bet.id).await.unwrap();
        assert_eq!(selections.len(), 1);
        assert_eq!(selections[0].status, BetStatus::Won);
    }
}
