use std::sync::Arc;

use chunkbench_common::config::BenchConfig;
use chunkbench_common::Result;
use chunkbench_target::ChunkTarget;

use crate::aggregate::{Collector, Event};
use crate::dispatch::Dispatcher;
use crate::pool::TokenPool;
use crate::report::Report;

/// Drives one sweep per `chunks_per_call` value, strictly one after another,
/// and returns every record once the last sweep is summarized.
pub async fn run_benchmark(config: &BenchConfig, target: Arc<dyn ChunkTarget>) -> Result<Report> {
    config.validate()?;
    let pool = TokenPool::new(config.max_concurrent_pushes);
    let dispatcher = Dispatcher::new(target, pool.clone());
    let collector = Collector::spawn();
    let events = collector.sender();

    for run in config.run_configs() {
        tracing::info!(
            target: "driver",
            chunks_per_call = run.chunks_per_call,
            chunk_size_bytes = run.chunk_size_bytes,
            "starting sweep"
        );
        let stats = dispatcher.sweep(config.total_chunks, run, &events).await?;
        let _ = events.send(Event::SweepFinished {
            run,
            dispatched: stats.dispatched,
            total_time: stats.elapsed,
            concurrent_jobs: pool.capacity(),
        });
        tracing::info!(
            target: "driver",
            elapsed = ?stats.elapsed,
            units = stats.dispatched,
            total_bytes = config.total_chunks.saturating_mul(run.chunk_size_bytes),
            bytes_per_call = run.bytes_per_call(),
            "sweep finished"
        );
    }

    drop(events);
    let records = collector.finish().await?;
    Ok(Report { records })
}
