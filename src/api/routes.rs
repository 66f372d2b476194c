//! API Routes
//!
//! HTTP endpoint definitions.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::TransactionMode;
use crate::domain::{Account, Amount, LedgerTransaction, RequestContext};
use crate::error::{AppError, AppResult};
use crate::ledger::{AccountStore, TransferEngine};
use crate::queue::{JobId, JobStatus, TransferQueue, TransferRequest};

// =========================================================================
// Application state
// =========================================================================

/// Shared handles for every request
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountStore>,
    pub engine: Arc<dyn TransferEngine>,
    pub queue: TransferQueue,
    pub transaction_mode: TransactionMode,
}

impl AppState {
    /// Build state around a single ledger that is both store and engine.
    /// The queue runs transfers through the same ledger.
    pub fn from_ledger<L>(ledger: L, queue_concurrency: usize, transaction_mode: TransactionMode) -> Self
    where
        L: AccountStore + TransferEngine + 'static,
    {
        let ledger = Arc::new(ledger);
        let engine: Arc<dyn TransferEngine> = ledger.clone();
        let queue = TransferQueue::new(engine.clone(), queue_concurrency);

        Self {
            accounts: ledger,
            engine,
            queue,
            transaction_mode,
        }
    }
}

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub initial_balance: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct CreateAccountResponse {
    pub message: &'static str,
    pub data: Account,
}

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    #[serde(default)]
    pub source_account_id: Option<String>,
    #[serde(default)]
    pub destination_account_id: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
}

/// A transfer request that passed boundary validation
#[derive(Debug)]
struct ValidTransfer {
    source_account_id: String,
    destination_account_id: String,
    amount: Amount,
}

impl CreateTransactionRequest {
    fn validate(self) -> Result<ValidTransfer, AppError> {
        let non_empty = |value: Option<String>| {
            value
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let (Some(source_account_id), Some(destination_account_id), Some(amount)) = (
            non_empty(self.source_account_id),
            non_empty(self.destination_account_id),
            self.amount,
        ) else {
            return Err(AppError::InvalidRequest(
                "source_account_id, destination_account_id and amount are required".to_string(),
            ));
        };

        if source_account_id == destination_account_id {
            return Err(AppError::InvalidRequest(
                "source and destination accounts must differ".to_string(),
            ));
        }

        let amount = Amount::new(amount)?;

        Ok(ValidTransfer {
            source_account_id,
            destination_account_id,
            amount,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct JobAcceptedResponse {
    #[serde(rename = "jobId")]
    pub job_id: JobId,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct JobPendingResponse {
    pub request_id: String,
    pub status: JobStatus,
    pub queue_position: usize,
}

#[derive(Debug, Serialize)]
pub struct JobSucceededResponse {
    pub request_id: String,
    pub status: JobStatus,
    #[serde(flatten)]
    pub transaction: LedgerTransaction,
}

#[derive(Debug, Serialize)]
pub struct JobFailedResponse {
    pub status: JobStatus,
    pub request_id: String,
    pub error: &'static str,
    pub error_message: String,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(welcome))
        // Accounts
        .route("/account", post(create_account))
        .route("/account/:account_id", get(get_account))
        // Transfers
        .route("/transactions", post(create_transaction))
        .route("/transactions/status/:job_id", get(get_transaction_status))
}

async fn welcome() -> Json<serde_json::Value> {
    Json(json!({ "message": "welcome" }))
}

// =========================================================================
// POST /account
// =========================================================================

/// Create an account with an opening balance
async fn create_account(
    State(state): State<AppState>,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateAccountResponse>), AppError> {
    let Json(request) = payload?;

    let account_id = request
        .account_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::InvalidRequest("account_id is required".to_string()))?;

    let initial_balance = request
        .initial_balance
        .ok_or_else(|| AppError::InvalidRequest("initial_balance is required".to_string()))?;
    let initial_balance = Amount::new(initial_balance)?;

    let account = state
        .accounts
        .create_account(&account_id, initial_balance.value())
        .await?;

    tracing::info!(account_id = %account.account_id, balance = %account.balance, "Account created");

    Ok((
        StatusCode::CREATED,
        Json(CreateAccountResponse {
            message: "Account created successfully",
            data: account,
        }),
    ))
}

// =========================================================================
// GET /account/:account_id
// =========================================================================

/// Get an account and its current balance
async fn get_account(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> AppResult<Json<Account>> {
    let account = state
        .accounts
        .get_account(&account_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Account {} not found", account_id)))?;

    Ok(Json(account))
}

// =========================================================================
// POST /transactions
// =========================================================================

/// Transfer between two accounts, inline or through the queue
async fn create_transaction(
    State(state): State<AppState>,
    context: Option<Extension<RequestContext>>,
    payload: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(request) = payload?;
    let transfer = request.validate()?;
    let correlation_id = context.and_then(|Extension(ctx)| ctx.correlation_id);

    match state.transaction_mode {
        TransactionMode::Sync => {
            let transaction = state
                .engine
                .transfer(
                    &transfer.source_account_id,
                    &transfer.destination_account_id,
                    transfer.amount,
                )
                .await?;

            tracing::info!(
                transaction_id = transaction.transaction_id,
                correlation_id = ?correlation_id,
                "Transfer completed"
            );

            Ok((StatusCode::CREATED, Json(transaction)).into_response())
        }
        TransactionMode::Queued => {
            let mut job = TransferRequest::new(
                transfer.source_account_id,
                transfer.destination_account_id,
                transfer.amount,
            );
            if let Some(correlation_id) = correlation_id {
                job = job.with_correlation_id(correlation_id);
            }

            let job_id = state.queue.submit(job);

            Ok((
                StatusCode::ACCEPTED,
                Json(JobAcceptedResponse {
                    job_id,
                    status: "Processing",
                }),
            )
                .into_response())
        }
    }
}

// =========================================================================
// GET /transactions/status/:job_id
// =========================================================================

/// Poll the status of a queued transfer
async fn get_transaction_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Response> {
    let result = job_id
        .parse::<JobId>()
        .ok()
        .and_then(|id| state.queue.status(id))
        .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))?;

    let request_id = result.request_id();

    let response = match result.status {
        JobStatus::Processing => (
            StatusCode::OK,
            Json(JobPendingResponse {
                request_id,
                status: result.status,
                queue_position: state.queue.depth(),
            }),
        )
            .into_response(),
        JobStatus::Success => match result.data {
            Some(transaction) => (
                StatusCode::OK,
                Json(JobSucceededResponse {
                    request_id,
                    status: result.status,
                    transaction,
                }),
            )
                .into_response(),
            None => {
                return Err(AppError::Internal(format!(
                    "Job {} succeeded without a transaction",
                    job_id
                )))
            }
        },
        JobStatus::Failed => (
            StatusCode::BAD_REQUEST,
            Json(JobFailedResponse {
                status: result.status,
                request_id,
                error: "TRANSACTION_FAILED",
                error_message: result.error.unwrap_or_default(),
            }),
        )
            .into_response(),
    };

    Ok(response)
}
