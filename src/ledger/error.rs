//! Ledger Errors
//!
//! Error types for account store and transfer operations.

use rust_decimal::Decimal;

use crate::domain::AmountError;

/// Errors that can occur in the ledger
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// One or both accounts of a transfer do not exist
    #[error("Account not found: {}", .ids.join(", "))]
    AccountNotFound { ids: Vec<String> },

    /// Source balance read under lock is below the requested amount
    #[error("Source account {account_id} has insufficient balance (available {available}, requested {requested})")]
    InsufficientFunds {
        account_id: String,
        available: Decimal,
        requested: Decimal,
    },

    /// Account id already taken
    #[error("Account already exists: {0}")]
    DuplicateAccount(String),

    /// Opening balance rejected (negative)
    #[error("Invalid balance: {0}")]
    Amount(#[from] AmountError),

    /// Database error (lock timeout, connectivity, constraint violation)
    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),
}

impl LedgerError {
    /// Machine-readable tag for logs and job results
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::AccountNotFound { .. } => "ACCOUNT_NOT_FOUND",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::DuplicateAccount(_) => "DUPLICATE_ACCOUNT",
            LedgerError::Amount(_) => "INVALID_BALANCE",
            LedgerError::Store(_) => "STORE_ERROR",
        }
    }
}
