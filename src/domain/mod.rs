//! Domain module
//!
//! Core domain types shared by the ledger, the queue and the HTTP layer.

pub mod account;
pub mod amount;
pub mod context;

pub use account::{Account, LedgerTransaction};
pub use amount::{Amount, AmountError, Balance};
pub use context::RequestContext;
