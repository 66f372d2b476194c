//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Where accounts and transactions live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(ConfigError::InvalidValue("STORAGE_BACKEND")),
        }
    }
}

/// How `POST /transactions` executes a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionMode {
    /// Run the transfer inside the request and answer 201
    #[default]
    Sync,
    /// Submit to the queue and answer 202 with a job id
    Queued,
}

impl FromStr for TransactionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sync" => Ok(TransactionMode::Sync),
            "queued" | "async" => Ok(TransactionMode::Queued),
            _ => Err(ConfigError::InvalidValue("TRANSACTION_MODE")),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::InvalidValue("LOG_FORMAT")),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL (required for the postgres backend)
    pub database_url: Option<String>,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    pub storage_backend: StorageBackend,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    pub transaction_mode: TransactionMode,

    /// Maximum transfers the queue runs at once
    pub queue_concurrency: usize,

    /// How long terminal job results are kept; `None` keeps them forever
    pub job_result_ttl: Option<Duration>,

    /// Period of the job result eviction sweep
    pub job_sweep_interval: Duration,

    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage_backend: StorageBackend = lookup("STORAGE_BACKEND")
            .unwrap_or_else(|| "postgres".to_string())
            .parse()?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingEnv("DATABASE_URL"));
        }

        let database_max_connections: u32 = lookup("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PORT"))?;

        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        let transaction_mode = match lookup("TRANSACTION_MODE") {
            Some(value) => value.parse()?,
            None => TransactionMode::default(),
        };

        // The queue limit defaults to the pool size so every worker can hold a connection
        let queue_concurrency = match lookup("QUEUE_CONCURRENCY") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidValue("QUEUE_CONCURRENCY"))?,
            None => database_max_connections as usize,
        };
        if queue_concurrency == 0 {
            return Err(ConfigError::InvalidValue("QUEUE_CONCURRENCY"));
        }

        let job_result_ttl = match lookup("JOB_RESULT_TTL_SECS") {
            Some(value) => Some(Duration::from_secs(
                value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("JOB_RESULT_TTL_SECS"))?,
            )),
            None => None,
        };

        let job_sweep_interval = Duration::from_secs(
            lookup("JOB_SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|| "60".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("JOB_SWEEP_INTERVAL_SECS"))?,
        );
        if job_sweep_interval.is_zero() {
            return Err(ConfigError::InvalidValue("JOB_SWEEP_INTERVAL_SECS"));
        }

        let log_format = match lookup("LOG_FORMAT") {
            Some(value) => value.parse()?,
            None => LogFormat::default(),
        };

        Ok(Self {
            database_url,
            database_max_connections,
            storage_backend,
            host,
            port,
            environment,
            transaction_mode,
            queue_concurrency,
            job_result_ttl,
            job_sweep_interval,
            log_format,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
