//! ledger_queue - Ledger Transfer API
//!
//! HTTP service for accounts and transfers. Transfers run inline or through
//! the in-process queue depending on `TRANSACTION_MODE`.

use std::net::SocketAddr;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ledger_queue::api::{self, AppState};
use ledger_queue::jobs::{JobScheduler, JobSchedulerConfig};
use ledger_queue::{db, Config, InMemoryLedger, LogFormat, PgLedger, StorageBackend};

/// Initialize tracing/logging
fn init_tracing(format: LogFormat) {
    let json = format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ledger_queue=debug,tower_http=debug".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

/// Connect to PostgreSQL and verify the ledger schema
async fn connect_database(config: &Config) -> anyhow::Result<PgPool> {
    let database_url = config
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for the postgres backend"))?;

    tracing::info!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(database_url)
        .await?;

    db::verify_connection(&pool).await?;

    if !db::check_schema(&pool).await? {
        tracing::error!("Database schema is not complete. Please run migrations.");
        return Err(anyhow::anyhow!("Database schema incomplete"));
    }

    tracing::info!("Database connected successfully");
    Ok(pool)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    init_tracing(config.log_format);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!(
        environment = %config.environment,
        backend = ?config.storage_backend,
        transaction_mode = ?config.transaction_mode,
        queue_concurrency = config.queue_concurrency,
        "Starting ledger_queue server"
    );

    let (state, pool) = match config.storage_backend {
        StorageBackend::Postgres => {
            let pool = connect_database(&config).await?;
            let state = AppState::from_ledger(
                PgLedger::new(pool.clone()),
                config.queue_concurrency,
                config.transaction_mode,
            );
            (state, Some(pool))
        }
        StorageBackend::Memory => {
            if config.is_production() {
                tracing::warn!("In-memory backend in production: balances are lost on restart");
            }
            let state = AppState::from_ledger(
                InMemoryLedger::new(),
                config.queue_concurrency,
                config.transaction_mode,
            );
            (state, None)
        }
    };

    // Job results are kept for the life of the process unless a TTL is set
    let scheduler = config.job_result_ttl.map(|ttl| {
        JobScheduler::with_config(
            state.queue.clone(),
            JobSchedulerConfig {
                job_result_ttl: ttl,
                sweep_interval: config.job_sweep_interval,
            },
        )
        .start()
    });

    let app = api::build_router(state);

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup
    tracing::info!("Server shutting down...");
    if let Some(scheduler) = scheduler {
        scheduler.abort();
    }
    if let Some(pool) = pool {
        pool.close().await;
        tracing::info!("Database connections closed");
    }
    tracing::info!("Goodbye!");

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
