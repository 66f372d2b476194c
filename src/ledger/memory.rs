//! In-memory ledger
//!
//! Process-local account store and transfer engine. Each account row sits
//! behind its own async mutex, which plays the part of a row lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{Account, Amount, Balance, LedgerTransaction};

use super::{lock_order, AccountStore, LedgerError, TransferEngine};

#[derive(Debug)]
struct AccountRow {
    balance: Balance,
    created_at: DateTime<Utc>,
}

type RowLock = Arc<tokio::sync::Mutex<AccountRow>>;

/// A thread-safe in-memory ledger.
///
/// Cloning shares the same underlying accounts and transaction log.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLedger {
    accounts: Arc<RwLock<HashMap<String, RowLock>>>,
    transactions: Arc<Mutex<Vec<LedgerTransaction>>>,
    next_transaction_id: Arc<AtomicI64>,
}

impl InMemoryLedger {
    /// Creates a new, empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every recorded transaction, in commit order.
    pub fn transactions(&self) -> Vec<LedgerTransaction> {
        self.transactions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sum of all account balances.
    pub async fn total_balance(&self) -> Decimal {
        let rows: Vec<RowLock> = self
            .accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let mut total = Decimal::ZERO;
        for row in rows {
            total += row.lock().await.balance.value();
        }
        total
    }

    fn row(&self, account_id: &str) -> Option<RowLock> {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(account_id)
            .cloned()
    }
}

#[async_trait]
impl TransferEngine for InMemoryLedger {
    async fn transfer(
        &self,
        source_id: &str,
        destination_id: &str,
        amount: Amount,
    ) -> Result<LedgerTransaction, LedgerError> {
        let source_row = self.row(source_id);
        let destination_row = self.row(destination_id);

        let (source_row, destination_row) = match (source_row, destination_row) {
            (Some(source), Some(destination)) => (source, destination),
            (source, destination) => {
                let mut ids = Vec::new();
                if source.is_none() {
                    ids.push(source_id.to_string());
                }
                if destination.is_none() {
                    ids.push(destination_id.to_string());
                }
                return Err(LedgerError::AccountNotFound { ids });
            }
        };

        // Acquire both row locks in canonical order. The yield between the
        // two acquisitions is a suspension point, like a round trip to a store.
        let source_first = lock_order(source_id, destination_id)[0] == source_id;
        let (first, second) = if source_first {
            (&source_row, &destination_row)
        } else {
            (&destination_row, &source_row)
        };
        let first_guard = first.lock().await;
        tokio::task::yield_now().await;
        let second_guard = second.lock().await;

        let (mut source, mut destination) = if source_first {
            (first_guard, second_guard)
        } else {
            (second_guard, first_guard)
        };

        let debited = source
            .balance
            .debit(&amount)
            .map_err(|_| LedgerError::InsufficientFunds {
                account_id: source_id.to_string(),
                available: source.balance.value(),
                requested: amount.value(),
            })?;
        destination.balance = destination.balance.credit(&amount);
        source.balance = debited;

        let record = LedgerTransaction {
            transaction_id: self.next_transaction_id.fetch_add(1, Ordering::SeqCst) + 1,
            source_account_id: source_id.to_string(),
            destination_account_id: destination_id.to_string(),
            amount: amount.value(),
            created_at: Utc::now(),
        };

        self.transactions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());

        Ok(record)
    }
}

#[async_trait]
impl AccountStore for InMemoryLedger {
    async fn create_account(
        &self,
        account_id: &str,
        initial_balance: Decimal,
    ) -> Result<Account, LedgerError> {
        let balance = Balance::new(initial_balance)?;
        let created_at = Utc::now();

        let mut accounts = self
            .accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if accounts.contains_key(account_id) {
            return Err(LedgerError::DuplicateAccount(account_id.to_string()));
        }
        accounts.insert(
            account_id.to_string(),
            Arc::new(tokio::sync::Mutex::new(AccountRow {
                balance,
                created_at,
            })),
        );

        Ok(Account {
            account_id: account_id.to_string(),
            balance: balance.value(),
            created_at,
        })
    }

    async fn get_account(&self, account_id: &str) -> Result<Option<Account>, LedgerError> {
        let Some(row) = self.row(account_id) else {
            return Ok(None);
        };

        let row = row.lock().await;
        Ok(Some(Account {
            account_id: account_id.to_string(),
            balance: row.balance.value(),
            created_at: row.created_at,
        }))
    }
}
