//! PostgreSQL ledger
//!
//! Account store and transfer engine backed by the `accounts` and
//! `transactions` tables. Row locks come from `SELECT ... FOR UPDATE`.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::{Account, Amount, LedgerTransaction};

use super::{lock_order, AccountStore, LedgerError, TransferEngine};

/// Ledger backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    /// Create a new PgLedger with a database pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Transfer unit of work
    // =========================================================================

    /// Steps of a transfer that run inside the caller's transaction.
    /// Any error returned here must be followed by a rollback.
    async fn apply_transfer(
        tx: &mut Transaction<'_, Postgres>,
        source_id: &str,
        destination_id: &str,
        amount: Amount,
    ) -> Result<LedgerTransaction, LedgerError> {
        // Lock both rows in one statement, in canonical order
        let ids: Vec<String> = lock_order(source_id, destination_id)
            .iter()
            .map(|id| id.to_string())
            .collect();

        let locked: Vec<(String, Decimal)> = sqlx::query_as(
            r#"
            SELECT account_id, balance
            FROM accounts
            WHERE account_id = ANY($1)
            ORDER BY account_id COLLATE "C"
            FOR UPDATE
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut **tx)
        .await?;

        let locked_balance = |id: &str| {
            locked
                .iter()
                .find(|(account_id, _)| account_id == id)
                .map(|(_, balance)| *balance)
        };

        let missing: Vec<String> = [source_id, destination_id]
            .into_iter()
            .filter(|&id| locked_balance(id).is_none())
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(LedgerError::AccountNotFound { ids: missing });
        }

        // Source balance as read under the lock
        let available = locked_balance(source_id).unwrap_or_default();
        if available < amount.value() {
            return Err(LedgerError::InsufficientFunds {
                account_id: source_id.to_string(),
                available,
                requested: amount.value(),
            });
        }

        sqlx::query("UPDATE accounts SET balance = balance - $1 WHERE account_id = $2")
            .bind(amount.value())
            .bind(source_id)
            .execute(&mut **tx)
            .await?;

        sqlx::query("UPDATE accounts SET balance = balance + $1 WHERE account_id = $2")
            .bind(amount.value())
            .bind(destination_id)
            .execute(&mut **tx)
            .await?;

        let record: LedgerTransaction = sqlx::query_as(
            r#"
            INSERT INTO transactions (source_account_id, destination_account_id, amount)
            VALUES ($1, $2, $3)
            RETURNING transaction_id, source_account_id, destination_account_id, amount, created_at
            "#,
        )
        .bind(source_id)
        .bind(destination_id)
        .bind(amount.value())
        .fetch_one(&mut **tx)
        .await?;

        Ok(record)
    }
}

#[async_trait]
impl TransferEngine for PgLedger {
    async fn transfer(
        &self,
        source_id: &str,
        destination_id: &str,
        amount: Amount,
    ) -> Result<LedgerTransaction, LedgerError> {
        let mut tx = self.pool.begin().await?;

        match Self::apply_transfer(&mut tx, source_id, destination_id, amount).await {
            Ok(record) => {
                tx.commit().await?;

                tracing::debug!(
                    transaction_id = record.transaction_id,
                    source = %source_id,
                    destination = %destination_id,
                    amount = %amount,
                    "Transfer committed"
                );

                Ok(record)
            }
            Err(e) => {
                // Releases the row locks; the original error wins over a rollback failure
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "Rollback after failed transfer failed");
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl AccountStore for PgLedger {
    async fn create_account(
        &self,
        account_id: &str,
        initial_balance: Decimal,
    ) -> Result<Account, LedgerError> {
        let result = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (account_id, balance)
            VALUES ($1, $2)
            RETURNING account_id, balance, created_at
            "#,
        )
        .bind(account_id)
        .bind(initial_balance)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(account) => Ok(account),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(LedgerError::DuplicateAccount(account_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_account(&self, account_id: &str) -> Result<Option<Account>, LedgerError> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT account_id, balance, created_at FROM accounts WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }
}
