//! Ledger module
//!
//! Account store and atomic two-account transfer engine.
//!
//! Both backends lock the two accounts of a transfer in [`lock_order`], so
//! concurrent transfers in opposite directions between the same pair can
//! never wait on each other in a cycle.

mod error;
mod memory;
mod postgres;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::{Account, Amount, LedgerTransaction};

pub use error::LedgerError;
pub use memory::InMemoryLedger;
pub use postgres::PgLedger;

/// Durable account_id -> balance mapping
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account with its opening balance
    async fn create_account(
        &self,
        account_id: &str,
        initial_balance: Decimal,
    ) -> Result<Account, LedgerError>;

    /// Read an account, `None` if it does not exist
    async fn get_account(&self, account_id: &str) -> Result<Option<Account>, LedgerError>;
}

/// Executes one atomic balance move between two accounts.
///
/// Callers validate that the ids differ and are non-empty; the amount is
/// positive by construction.
#[async_trait]
pub trait TransferEngine: Send + Sync {
    async fn transfer(
        &self,
        source_id: &str,
        destination_id: &str,
        amount: Amount,
    ) -> Result<LedgerTransaction, LedgerError>;
}

/// Canonical lock acquisition order for two account ids.
///
/// Byte-wise lexicographic, independent of which id is the source.
pub fn lock_order<'a>(a: &'a str, b: &'a str) -> [&'a str; 2] {
    if a <= b {
        [a, b]
    } else {
        [b, a]
    }
}
