//! Common test utilities
#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::OnceCell;
use tower::util::ServiceExt;

use ledger_queue::api::{self, AppState};
use ledger_queue::{AccountStore, InMemoryLedger, TransactionMode};

const MIGRATION: &str = include_str!("../../migrations/0001_create_ledger.sql");

static MIGRATED: OnceCell<()> = OnceCell::const_new();

/// In-memory app seeded with ACC-1 (5000) and ACC-2 (1000)
pub async fn memory_app(mode: TransactionMode) -> (Router, AppState, InMemoryLedger) {
    let ledger = InMemoryLedger::new();
    ledger.create_account("ACC-1", Decimal::from(5000)).await.unwrap();
    ledger.create_account("ACC-2", Decimal::from(1000)).await.unwrap();

    let state = AppState::from_ledger(ledger.clone(), 4, mode);
    (api::build_router(state.clone()), state, ledger)
}

/// Send a request and decode the JSON response body (Null when empty or not JSON)
pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_with_headers(app, method, uri, body, &[]).await
}

pub async fn send_with_headers(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }

    let req = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// Read a decimal that serde rendered as a JSON string
pub fn decimal(value: &Value) -> Decimal {
    value
        .as_str()
        .unwrap_or_else(|| panic!("expected decimal string, got {}", value))
        .parse()
        .unwrap()
}

/// Account id unique to one test run, so tests can share a database
pub fn unique_account_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}

/// Connect to the test database and make sure the ledger schema exists
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    MIGRATED
        .get_or_init(|| async {
            sqlx::Executor::execute(&pool, MIGRATION)
                .await
                .expect("Failed to apply migration");
        })
        .await;

    pool
}
