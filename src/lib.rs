//! ledger_queue Library
//!
//! Account ledger with atomic two-account transfers, an in-process
//! bounded-concurrency transfer queue, and the HTTP API over both.
//! Re-exports modules for integration testing and the binaries.

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
mod error;
pub mod jobs;
pub mod ledger;
pub mod queue;

pub use config::{Config, LogFormat, StorageBackend, TransactionMode};
pub use domain::{Account, Amount, AmountError, Balance, LedgerTransaction, RequestContext};
pub use error::{AppError, AppResult, ErrorResponse};
pub use ledger::{AccountStore, InMemoryLedger, LedgerError, PgLedger, TransferEngine};
pub use queue::{JobId, JobResult, JobStatus, TransferQueue, TransferRequest};
