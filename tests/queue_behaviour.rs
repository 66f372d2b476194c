//! Transfer queue behaviour under load

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use ledger_queue::{
    AccountStore, Amount, InMemoryLedger, JobStatus, LedgerError, LedgerTransaction,
    TransferEngine, TransferQueue, TransferRequest,
};

/// Engine that records how many transfers overlap and the order they start in
#[derive(Default)]
struct RecordingEngine {
    running: AtomicUsize,
    max_running: AtomicUsize,
    started: Mutex<Vec<String>>,
}

#[async_trait]
impl TransferEngine for RecordingEngine {
    async fn transfer(
        &self,
        source_id: &str,
        destination_id: &str,
        amount: Amount,
    ) -> Result<LedgerTransaction, LedgerError> {
        self.started.lock().unwrap().push(source_id.to_string());
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(10)).await;

        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(LedgerTransaction {
            transaction_id: 1,
            source_account_id: source_id.to_string(),
            destination_account_id: destination_id.to_string(),
            amount: amount.value(),
            created_at: Utc::now(),
        })
    }
}

fn one() -> Amount {
    Amount::new(dec!(1)).unwrap()
}

async fn wait_all(queue: &TransferQueue, ids: &[ledger_queue::JobId]) -> Vec<ledger_queue::JobResult> {
    let all = futures::future::join_all(ids.iter().map(|id| queue.wait(*id)));
    tokio::time::timeout(Duration::from_secs(30), all)
        .await
        .expect("queue did not drain")
        .into_iter()
        .map(|r| r.expect("result missing"))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_never_exceeds_limit() {
    let engine = Arc::new(RecordingEngine::default());
    let queue = TransferQueue::new(engine.clone(), 3);

    let ids: Vec<_> = (0..20)
        .map(|i| queue.submit(TransferRequest::new(format!("SRC-{}", i), "DST", one())))
        .collect();
    let results = wait_all(&queue, &ids).await;

    assert!(results.iter().all(|r| r.status == JobStatus::Success));
    assert_eq!(engine.max_running.load(Ordering::SeqCst), 3);
    assert_eq!(queue.in_flight(), 0);
    assert_eq!(queue.depth(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_worker_runs_jobs_in_submission_order() {
    let engine = Arc::new(RecordingEngine::default());
    let queue = TransferQueue::new(engine.clone(), 1);

    let sources: Vec<String> = (0..10).map(|i| format!("SRC-{:02}", i)).collect();
    let ids: Vec<_> = sources
        .iter()
        .map(|source| queue.submit(TransferRequest::new(source.clone(), "DST", one())))
        .collect();
    wait_all(&queue, &ids).await;

    assert_eq!(*engine.started.lock().unwrap(), sources);
    assert_eq!(engine.max_running.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_status_is_monotonic() {
    let engine = Arc::new(RecordingEngine::default());
    let queue = TransferQueue::new(engine, 1);

    // A backlog ahead of the observed job keeps it PROCESSING for a while
    for i in 0..5 {
        queue.submit(TransferRequest::new(format!("SRC-{}", i), "DST", one()));
    }
    let job_id = queue.submit(TransferRequest::new("WATCHED", "DST", one()));

    let mut seen = Vec::new();
    let observe = async {
        loop {
            let status = queue.status(job_id).unwrap().status;
            seen.push(status);
            if status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        for _ in 0..10 {
            seen.push(queue.status(job_id).unwrap().status);
        }
    };
    tokio::time::timeout(Duration::from_secs(10), observe)
        .await
        .expect("job never finished");

    assert_eq!(seen[0], JobStatus::Processing);
    let first_terminal = seen.iter().position(|s| s.is_terminal()).unwrap();
    assert!(seen[..first_terminal].iter().all(|s| *s == JobStatus::Processing));
    assert!(seen[first_terminal..].iter().all(|s| *s == JobStatus::Success));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dispatch_restarts_after_going_idle() {
    let engine = Arc::new(RecordingEngine::default());
    let queue = TransferQueue::new(engine.clone(), 2);

    let first = queue.submit(TransferRequest::new("SRC-1", "DST", one()));
    wait_all(&queue, &[first]).await;

    // Give the dispatch loop time to notice the empty backlog and stop
    tokio::time::sleep(Duration::from_millis(20)).await;

    let second = queue.submit(TransferRequest::new("SRC-2", "DST", one()));
    let results = wait_all(&queue, &[second]).await;
    assert_eq!(results[0].status, JobStatus::Success);
    assert_eq!(engine.started.lock().unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_alternating_transfers_through_queue_do_not_deadlock() {
    let ledger = InMemoryLedger::new();
    ledger.create_account("ACC-1", dec!(5000)).await.unwrap();
    ledger.create_account("ACC-2", dec!(1000)).await.unwrap();
    let queue = TransferQueue::new(Arc::new(ledger.clone()), 25);

    let ids: Vec<_> = (0..500)
        .map(|i| {
            let (from, to) = if i % 2 == 0 { ("ACC-1", "ACC-2") } else { ("ACC-2", "ACC-1") };
            queue.submit(TransferRequest::new(from, to, one()))
        })
        .collect();
    let results = wait_all(&queue, &ids).await;

    assert!(results.iter().all(|r| r.status == JobStatus::Success));
    assert_eq!(ledger.total_balance().await, dec!(6000));
    assert_eq!(ledger.transactions().len(), 500);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_money_is_conserved_with_failures() {
    let ledger = InMemoryLedger::new();
    let accounts = ["ACC-A", "ACC-B", "ACC-C", "ACC-D"];
    for id in accounts {
        ledger.create_account(id, dec!(100)).await.unwrap();
    }
    let queue = TransferQueue::new(Arc::new(ledger.clone()), 8);

    // Large amounts guarantee some transfers fail for insufficient funds
    let mut ids = Vec::new();
    for i in 0..400usize {
        let from = accounts[i % 4];
        let to = accounts[(i * 3 + 1) % 4];
        if from == to {
            continue;
        }
        let amount = Amount::new(Decimal::from((i % 7 + 1) * 15)).unwrap();
        ids.push(queue.submit(TransferRequest::new(from, to, amount)));
    }
    // Plus some transfers to an account that does not exist
    for _ in 0..10 {
        ids.push(queue.submit(TransferRequest::new("ACC-A", "GHOST-1", one())));
    }

    let results = wait_all(&queue, &ids).await;

    let succeeded = results.iter().filter(|r| r.status == JobStatus::Success).count();
    let failed: Vec<_> = results.iter().filter(|r| r.status == JobStatus::Failed).collect();
    assert_eq!(succeeded + failed.len(), ids.len());
    assert!(failed.iter().all(|r| r.error.is_some() && r.data.is_none()));
    assert!(failed.len() >= 10);

    assert_eq!(ledger.total_balance().await, dec!(400));
    assert_eq!(ledger.transactions().len(), succeeded);
    for id in accounts {
        let account = ledger.get_account(id).await.unwrap().unwrap();
        assert!(account.balance >= Decimal::ZERO, "{} went negative", id);
    }
}
