//! Transfer Queue
//!
//! In-process job queue for transfers. Submissions return a `JobId`
//! immediately; a single dispatch loop starts queued jobs in FIFO order with at
//! most `concurrency` running at once, and each job's result can be polled
//! with [`TransferQueue::status`] or awaited with [`TransferQueue::wait`].
//!
//! The queue limits resource usage only. Balance safety between overlapping
//! transfers comes from the ledger's row locks.

mod job;

use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::{watch, Notify};
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::ledger::TransferEngine;

pub use job::{Job, JobId, JobResult, JobStatus, TransferRequest};

/// Default number of transfers allowed to run at once
pub const DEFAULT_CONCURRENCY: usize = 25;

type ResultMap = HashMap<JobId, watch::Sender<JobResult>>;

/// Handle to the queue. Cloning is cheap and shares the same queue.
#[derive(Clone)]
pub struct TransferQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    engine: Arc<dyn TransferEngine>,
    concurrency: usize,
    /// Jobs not yet started, plus whether a dispatch loop owns them
    backlog: Mutex<Backlog>,
    results: RwLock<ResultMap>,
    /// Wakes the dispatch loop when a job is added while it is running
    job_added: Notify,
    in_flight: AtomicUsize,
}

#[derive(Default)]
struct Backlog {
    jobs: VecDeque<Job>,
    dispatching: bool,
}

impl TransferQueue {
    /// Create a queue running at most `concurrency` transfers at once
    pub fn new(engine: Arc<dyn TransferEngine>, concurrency: usize) -> Self {
        if concurrency == 0 {
            tracing::warn!("Queue concurrency of 0 requested, using 1");
        }

        Self {
            inner: Arc::new(QueueInner {
                engine,
                concurrency: concurrency.max(1),
                backlog: Mutex::new(Backlog::default()),
                results: RwLock::new(HashMap::new()),
                job_added: Notify::new(),
                in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Queue a transfer and return its handle without waiting for it.
    ///
    /// The job is visible as `PROCESSING` before this returns. Must be called
    /// from within a Tokio runtime.
    pub fn submit(&self, request: TransferRequest) -> JobId {
        let job = Job::new(request);
        let job_id = job.id;

        let (sender, _) = watch::channel(JobResult::processing(&job));
        self.inner.write_results().insert(job_id, sender);

        tracing::info!(
            job_id = %job_id,
            source = %job.request.source_account_id,
            destination = %job.request.destination_account_id,
            amount = %job.request.amount,
            correlation_id = ?job.request.correlation_id,
            queue_size = self.depth(),
            active_workers = self.in_flight(),
            "Adding transfer to queue"
        );

        let start_dispatch = {
            let mut backlog = self.inner.lock_backlog();
            backlog.jobs.push_back(job);
            !std::mem::replace(&mut backlog.dispatching, true)
        };

        if start_dispatch {
            tracing::debug!(job_id = %job_id, "Starting queue dispatch");
            tokio::spawn(Arc::clone(&self.inner).dispatch());
        } else {
            self.inner.job_added.notify_one();
        }

        job_id
    }

    /// Current state of a job, `None` for unknown ids. Never blocks on the job.
    pub fn status(&self, job_id: JobId) -> Option<JobResult> {
        self.inner
            .read_results()
            .get(&job_id)
            .map(|sender| sender.borrow().clone())
    }

    /// Wait until a job reaches a terminal state.
    ///
    /// Returns `None` for unknown ids or if the result is evicted first.
    pub async fn wait(&self, job_id: JobId) -> Option<JobResult> {
        let mut receiver = self.inner.read_results().get(&job_id)?.subscribe();

        let result = receiver
            .wait_for(|result| result.status.is_terminal())
            .await
            .ok()
            .map(|result| result.clone());
        result
    }

    /// Number of jobs waiting to start
    pub fn depth(&self) -> usize {
        self.inner.lock_backlog().jobs.len()
    }

    /// Number of transfers currently running
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Configured concurrency limit
    pub fn concurrency(&self) -> usize {
        self.inner.concurrency
    }

    /// Drop terminal results last updated more than `ttl` ago.
    /// Returns the number of results removed.
    pub fn evict_finished(&self, ttl: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl))
        else {
            return 0;
        };

        let mut results = self.inner.write_results();
        let before = results.len();
        results.retain(|_, sender| {
            let result = sender.borrow();
            !(result.status.is_terminal() && result.updated_at < cutoff)
        });
        before - results.len()
    }
}

impl QueueInner {
    fn lock_backlog(&self) -> MutexGuard<'_, Backlog> {
        self.backlog.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_results(&self) -> RwLockReadGuard<'_, ResultMap> {
        self.results.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_results(&self) -> RwLockWriteGuard<'_, ResultMap> {
        self.results.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_job(&self) -> Option<Job> {
        self.lock_backlog().jobs.pop_front()
    }

    /// The dispatch loop. Exactly one instance runs while `dispatching` is set.
    async fn dispatch(self: Arc<Self>) {
        tracing::info!(
            queue_size = self.lock_backlog().jobs.len(),
            concurrency = self.concurrency,
            "Queue processing started"
        );

        let mut workers = JoinSet::new();

        loop {
            // Fill free slots from the front of the backlog
            while workers.len() < self.concurrency {
                let Some(job) = self.next_job() else {
                    break;
                };

                tracing::debug!(
                    job_id = %job.id,
                    active_workers = workers.len() + 1,
                    queue_remaining = self.lock_backlog().jobs.len(),
                    "Starting worker for job"
                );

                let span = tracing::info_span!(
                    "transfer_job",
                    job_id = %job.id,
                    correlation_id = ?job.request.correlation_id
                );
                let inner = Arc::clone(&self);
                workers.spawn(async move { inner.run_job(job).await }.instrument(span));
            }

            if workers.is_empty() {
                // Stop only if nothing was queued since the last pop
                let mut backlog = self.lock_backlog();
                if backlog.jobs.is_empty() {
                    backlog.dispatching = false;
                    break;
                }
                continue;
            }

            tokio::select! {
                Some(joined) = workers.join_next() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "Transfer worker aborted");
                    }
                }
                _ = self.job_added.notified(), if workers.len() < self.concurrency => {}
            }
        }

        tracing::info!(queue_size = self.lock_backlog().jobs.len(), "Queue processing stopped");
    }

    async fn run_job(&self, job: Job) {
        let active = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(active_workers = active, "Processing job from queue");

        let request = &job.request;
        let outcome = AssertUnwindSafe(self.engine.transfer(
            &request.source_account_id,
            &request.destination_account_id,
            request.amount,
        ))
        .catch_unwind()
        .await;

        let result = match outcome {
            Ok(Ok(transaction)) => {
                tracing::debug!(
                    transaction_id = transaction.transaction_id,
                    "Job completed successfully"
                );
                JobResult::success(&job, transaction)
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, error_kind = e.kind(), "Job failed");
                JobResult::failed(&job, e.to_string(), e.kind())
            }
            Err(_) => {
                tracing::error!("Job panicked");
                JobResult::failed(&job, "Transfer worker panicked", "INTERNAL_ERROR")
            }
        };

        // The slot is free before any waiter sees the result
        let active = self.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        tracing::debug!(active_workers = active, "Worker released");

        self.complete(result);
    }

    /// Record a terminal result. Only the first terminal write sticks.
    fn complete(&self, result: JobResult) {
        let results = self.read_results();
        let Some(sender) = results.get(&result.job_id) else {
            return;
        };

        sender.send_if_modified(|current| {
            if current.status.is_terminal() {
                return false;
            }
            *current = result;
            true
        });
    }
}
