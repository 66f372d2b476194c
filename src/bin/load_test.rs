//! Load Testing Tool
//!
//! Pushes alternating-direction transfers between two accounts through the
//! queue on the in-memory ledger, then checks that no money was created or lost.
//!
//! Run with: cargo run --bin load_test --release -- --transfers 10000 --concurrency 25

use std::sync::Arc;
use std::time::Instant;

use rust_decimal::Decimal;

use ledger_queue::queue::DEFAULT_CONCURRENCY;
use ledger_queue::{AccountStore, Amount, InMemoryLedger, JobStatus, TransferQueue, TransferRequest};

fn arg<T: std::str::FromStr>(args: &[String], name: &str) -> Option<T> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let transfer_count: usize = arg(&args, "--transfers").unwrap_or(10_000);
    let concurrency: usize = arg(&args, "--concurrency").unwrap_or(DEFAULT_CONCURRENCY);

    println!(
        "Load Test - {} transfers, concurrency {}",
        transfer_count, concurrency
    );

    let ledger = InMemoryLedger::new();
    ledger.create_account("LOAD-A", Decimal::from(1_000_000)).await?;
    ledger.create_account("LOAD-B", Decimal::from(1_000_000)).await?;
    let total_before = ledger.total_balance().await;

    let queue = TransferQueue::new(Arc::new(ledger.clone()), concurrency);
    let amount = Amount::new(Decimal::ONE)?;

    let start = Instant::now();

    let job_ids: Vec<_> = (0..transfer_count)
        .map(|i| {
            let (from, to) = if i % 2 == 0 { ("LOAD-A", "LOAD-B") } else { ("LOAD-B", "LOAD-A") };
            queue.submit(TransferRequest::new(from, to, amount))
        })
        .collect();

    println!("Submitted {} jobs, backlog {}", job_ids.len(), queue.depth());

    let results = futures::future::join_all(job_ids.iter().map(|id| queue.wait(*id))).await;

    let elapsed = start.elapsed();
    let succeeded = results
        .iter()
        .filter(|r| matches!(r, Some(r) if r.status == JobStatus::Success))
        .count();
    let failed = results.len() - succeeded;

    let total_after = ledger.total_balance().await;
    let rate = transfer_count as f64 / elapsed.as_secs_f64();

    println!("\n=== Load Test Results ===");
    println!("Total transfers: {}", transfer_count);
    println!("Successful: {}", succeeded);
    println!("Failed: {}", failed);
    println!("Recorded transactions: {}", ledger.transactions().len());
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Rate: {:.0} transfers/sec", rate);
    println!(
        "Total balance: {} -> {} ({})",
        total_before,
        total_after,
        if total_before == total_after { "conserved" } else { "MISMATCH" }
    );

    if total_before != total_after {
        anyhow::bail!("balance not conserved");
    }

    Ok(())
}
