//! Ledger records
//!
//! Row types for the `accounts` and `transactions` tables.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An account and its current balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub account_id: String,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Immutable record of one successful transfer.
///
/// Written exactly once, inside the same unit of work as the two balance
/// updates it describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LedgerTransaction {
    pub transaction_id: i64,
    pub source_account_id: String,
    pub destination_account_id: String,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}
