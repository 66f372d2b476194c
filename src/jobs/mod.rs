//! Scheduled Jobs
//!
//! Background jobs for periodic maintenance tasks.
//! Terminal job results are kept in memory and swept once they outlive their TTL.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::interval;

use crate::queue::TransferQueue;

// =========================================================================
// Job result eviction
// =========================================================================

/// Drop terminal job results older than `ttl`.
/// Results still in PROCESSING are never touched.
pub fn evict_expired_results(queue: &TransferQueue, ttl: Duration) -> usize {
    let evicted = queue.evict_finished(ttl);

    if evicted > 0 {
        tracing::info!(
            evicted = evicted,
            ttl_secs = ttl.as_secs(),
            "Evicted expired job results"
        );
    }

    evicted
}

// =========================================================================
// Job Scheduler
// =========================================================================

/// Configuration for job scheduler
#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    /// How long a terminal job result stays pollable (default: 1 hour)
    pub job_result_ttl: Duration,
    /// Interval between eviction sweeps (default: 1 minute)
    pub sweep_interval: Duration,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self {
            job_result_ttl: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Job Scheduler - runs periodic maintenance tasks
pub struct JobScheduler {
    queue: TransferQueue,
    config: JobSchedulerConfig,
}

impl JobScheduler {
    /// Create a new job scheduler
    pub fn new(queue: TransferQueue) -> Self {
        Self {
            queue,
            config: JobSchedulerConfig::default(),
        }
    }

    /// Create with custom configuration
    pub fn with_config(queue: TransferQueue, config: JobSchedulerConfig) -> Self {
        Self { queue, config }
    }

    /// Start the job scheduler in the background
    /// Returns a handle that can be used to abort the scheduler
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the scheduler loop
    async fn run(&self) {
        tracing::info!(
            ttl_secs = self.config.job_result_ttl.as_secs(),
            sweep_interval_secs = self.config.sweep_interval.as_secs(),
            "Job scheduler started"
        );

        let mut sweep_interval = interval(self.config.sweep_interval);

        loop {
            sweep_interval.tick().await;
            evict_expired_results(&self.queue, self.config.job_result_ttl);
        }
    }

    /// Run all maintenance jobs once (for manual trigger or testing)
    pub fn run_all_once(&self) -> MaintenanceReport {
        MaintenanceReport {
            job_results_evicted: evict_expired_results(&self.queue, self.config.job_result_ttl),
            completed_at: Utc::now(),
        }
    }
}

/// Report from running maintenance jobs
#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    pub job_results_evicted: usize,
    pub completed_at: DateTime<Utc>,
}

// =========================================================================
// Tests
// =========================================================================
