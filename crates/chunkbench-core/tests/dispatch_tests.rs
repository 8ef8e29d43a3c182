use std::sync::Arc;
use std::time::Duration;

use chunkbench_common::config::BenchConfig;
use chunkbench_common::{BenchError, ChunkRange, RunConfig};
use chunkbench_core::{partition, run_benchmark, Dispatcher, Event, ResultRecord, TokenPool};
use chunkbench_target::mock::MockTarget;
use tokio::sync::mpsc;

fn run(chunks_per_call: u64) -> RunConfig {
    RunConfig { chunk_size_bytes: 16, chunks_per_call }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[test]
fn partition_covers_range_exactly() {
    for total in 1..=60u64 {
        for per_call in 1..=25u64 {
            let ranges: Vec<ChunkRange> = partition(total, per_call).collect();
            assert_eq!(ranges.len(), partition(total, per_call).len());
            let mut next = 0;
            for r in &ranges {
                assert_eq!(r.start, next, "gap or overlap for total={total} per_call={per_call}");
                assert!(!r.is_empty());
                next = r.end;
            }
            assert_eq!(next, total);
            let expected_last = if total % per_call == 0 { per_call } else { total % per_call };
            assert_eq!(ranges.last().unwrap().len(), expected_last);
        }
    }
}

#[tokio::test]
async fn sweep_dispatches_one_unit_per_range() {
    let target = Arc::new(MockTarget::new());
    let dispatcher = Dispatcher::new(target.clone(), TokenPool::new(5));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let stats = dispatcher.sweep(200, run(10), &tx).await.unwrap();

    assert_eq!(stats.dispatched, 20);
    assert_eq!(target.calls(), 20);
    let mut seen: Vec<ChunkRange> = target.received().into_iter().map(|(r, _)| r).collect();
    seen.sort_by_key(|r| r.start);
    assert_eq!(seen, partition(200, 10).collect::<Vec<_>>());
    assert!(target.received().iter().all(|(_, len)| *len == 160));
    assert_eq!(drain(&mut rx).len(), 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn in_flight_units_never_exceed_pool_capacity() {
    let target = Arc::new(MockTarget::new().with_latency(Duration::from_millis(15)));
    let pool = TokenPool::new(3);
    let dispatcher = Dispatcher::new(target.clone(), pool.clone());
    let (tx, _rx) = mpsc::unbounded_channel();

    dispatcher.sweep(30, run(1), &tx).await.unwrap();

    assert!(pool.peak_in_flight() <= 3, "peak {}", pool.peak_in_flight());
    assert!(target.peak_concurrency() <= 3, "peak {}", target.peak_concurrency());
    assert!(target.peak_concurrency() > 1);
    assert_eq!(target.calls(), 30);
}

#[tokio::test]
async fn tokens_are_all_returned_after_a_sweep() {
    let target = Arc::new(
        MockTarget::new()
            .with_latency(Duration::from_millis(2))
            .reject(ChunkRange::new(4, 6), 503, "busy"),
    );
    let pool = TokenPool::new(4);
    let dispatcher = Dispatcher::new(target, pool.clone());
    let (tx, _rx) = mpsc::unbounded_channel();

    dispatcher.sweep(20, run(2), &tx).await.unwrap();

    assert_eq!(pool.available(), pool.capacity());
    assert_eq!(pool.in_flight(), 0);
}

#[tokio::test]
async fn transport_failure_is_isolated_to_its_unit() {
    let target = Arc::new(MockTarget::new().fail_transport(ChunkRange::new(3, 4), "connection reset"));
    let dispatcher = Dispatcher::new(target.clone(), TokenPool::new(2));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let stats = dispatcher.sweep(10, run(1), &tx).await.unwrap();

    assert_eq!(stats.dispatched, 10);
    assert_eq!(target.calls(), 10);
    let events = drain(&mut rx);
    let failed: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::Failed { range, error } => Some((*range, error.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, ChunkRange::new(3, 4));
    assert!(failed[0].1.contains("connection reset"));
    let pushed = events.iter().filter(|e| matches!(e, Event::Pushed { .. })).count();
    assert_eq!(pushed, 9);
}

#[tokio::test]
async fn fatal_unit_error_stops_the_sweep() {
    let target = Arc::new(MockTarget::new().fail_construction(ChunkRange::new(0, 1), "bad request"));
    let dispatcher = Dispatcher::new(target, TokenPool::new(1));
    let (tx, _rx) = mpsc::unbounded_channel();

    let err = dispatcher.sweep(50, run(1), &tx).await.unwrap_err();
    assert!(matches!(err, BenchError::RequestConstruction(_)), "{err:?}");
}

#[tokio::test]
async fn driver_summarizes_each_sweep_in_order() {
    let target = Arc::new(MockTarget::new().reject(ChunkRange::new(3, 6), 500, "boom"));
    let config = BenchConfig {
        total_chunks: 10,
        chunk_size_bytes: 8,
        max_concurrent_pushes: 2,
        sweep: vec![1, 3],
        ..BenchConfig::default()
    };

    let report = run_benchmark(&config, target).await.unwrap();

    let summaries: Vec<_> = report.summaries().collect();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].config_used.chunks_per_call, 1);
    assert_eq!(summaries[0].dispatched_units, 10);
    assert_eq!(summaries[0].failed_units, 0);
    assert_eq!(summaries[0].total_data_transferred_bytes, 80);
    assert_eq!(summaries[1].config_used.chunks_per_call, 3);
    assert_eq!(summaries[1].dispatched_units, 4);
    assert_eq!(summaries[1].failed_units, 1);
    assert_eq!(summaries[1].total_data_transferred_bytes, 56);
    assert!(summaries.iter().all(|s| s.concurrent_jobs == 2));

    // the failure of the second sweep is recorded after the first summary and before the second
    let kinds: Vec<&str> = report
        .records
        .iter()
        .map(|r| match r {
            ResultRecord::Failure { .. } => "failure",
            ResultRecord::Summary(_) => "summary",
        })
        .collect();
    assert_eq!(kinds, vec!["summary", "failure", "summary"]);
}

#[tokio::test]
async fn driver_rejects_invalid_config() {
    let config = BenchConfig { sweep: vec![], ..BenchConfig::default() };
    let err = run_benchmark(&config, Arc::new(MockTarget::new())).await.unwrap_err();
    assert!(matches!(err, BenchError::Config(_)));
}

#[tokio::test]
async fn driver_rejects_overflowing_payload_before_dispatch() {
    let target = Arc::new(MockTarget::new());
    let config = BenchConfig { chunk_size_bytes: 1 << 62, sweep: vec![4], ..BenchConfig::default() };
    let err = run_benchmark(&config, target.clone()).await.unwrap_err();
    assert!(matches!(err, BenchError::Config(_)));
    assert_eq!(target.calls(), 0);
}
