//! Queue job types
//!
//! A job is a transfer intent owned by the queue; its `JobResult` is the only
//! part callers ever see.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::{Amount, LedgerTransaction};

/// Opaque handle returned by `TransferQueue::submit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a fresh, globally unique id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Transfer requested through the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub source_account_id: String,
    pub destination_account_id: String,
    pub amount: Amount,
    /// Opaque tracing token supplied by the caller
    pub correlation_id: Option<String>,
}

impl TransferRequest {
    pub fn new(
        source_account_id: impl Into<String>,
        destination_account_id: impl Into<String>,
        amount: Amount,
    ) -> Self {
        Self {
            source_account_id: source_account_id.into(),
            destination_account_id: destination_account_id.into(),
            amount,
            correlation_id: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// A queued transfer
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub request: TransferRequest,
    pub submitted_at: DateTime<Utc>,
}

impl Job {
    pub fn new(request: TransferRequest) -> Self {
        Self {
            id: JobId::new(),
            request,
            submitted_at: Utc::now(),
        }
    }
}

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Processing,
    Success,
    Failed,
}

impl JobStatus {
    /// `Success` and `Failed` are written once and never reverted
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed)
    }
}

/// Current state of a job as seen by callers
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    pub job_id: JobId,
    pub correlation_id: Option<String>,
    pub status: JobStatus,
    pub data: Option<LedgerTransaction>,
    pub error: Option<String>,
    /// Machine-readable failure tag, kept for logs only
    pub error_kind: Option<&'static str>,
    pub updated_at: DateTime<Utc>,
}

impl JobResult {
    pub fn processing(job: &Job) -> Self {
        Self {
            job_id: job.id,
            correlation_id: job.request.correlation_id.clone(),
            status: JobStatus::Processing,
            data: None,
            error: None,
            error_kind: None,
            updated_at: Utc::now(),
        }
    }

    pub fn success(job: &Job, transaction: LedgerTransaction) -> Self {
        Self {
            status: JobStatus::Success,
            data: Some(transaction),
            updated_at: Utc::now(),
            ..Self::processing(job)
        }
    }

    pub fn failed(job: &Job, error: impl Into<String>, error_kind: &'static str) -> Self {
        Self {
            status: JobStatus::Failed,
            error: Some(error.into()),
            error_kind: Some(error_kind),
            updated_at: Utc::now(),
            ..Self::processing(job)
        }
    }

    /// Correlation id if the caller sent one, the job id otherwise
    pub fn request_id(&self) -> String {
        self.correlation_id
            .clone()
            .unwrap_or_else(|| self.job_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn job() -> Job {
        Job::new(TransferRequest::new("ACC-1", "ACC-2", Amount::new(dec!(100)).unwrap()))
    }

    #[test]
    fn test_job_ids_are_unique() {
        assert_ne!(JobId::new(), JobId::new());
    }

    #[test]
    fn test_job_id_parse_roundtrip() {
        let id = JobId::new();
        let parsed: JobId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-job".parse::<JobId>().is_err());
    }

    #[test]
    fn test_status_serializes_uppercase() {
        assert_eq!(serde_json::to_value(JobStatus::Processing).unwrap(), "PROCESSING");
        assert_eq!(serde_json::to_value(JobStatus::Success).unwrap(), "SUCCESS");
        assert_eq!(serde_json::to_value(JobStatus::Failed).unwrap(), "FAILED");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Success.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_failed_result_keeps_identity() {
        let job = job();
        let result = JobResult::failed(&job, "Account not found: GHOST-1", "ACCOUNT_NOT_FOUND");

        assert_eq!(result.job_id, job.id);
        assert_eq!(result.status, JobStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("Account not found: GHOST-1"));
        assert!(result.data.is_none());
    }

    #[test]
    fn test_request_id_prefers_correlation_id() {
        let plain = job();
        assert_eq!(JobResult::processing(&plain).request_id(), plain.id.to_string());

        let mut tagged = job();
        tagged.request.correlation_id = Some("req-7".to_string());
        assert_eq!(JobResult::processing(&tagged).request_id(), "req-7");
    }
}
