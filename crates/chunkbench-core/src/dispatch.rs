use std::sync::Arc;
use std::time::{Duration, Instant};

use chunkbench_common::{BenchError, ChunkRange, Result, RunConfig};
use chunkbench_target::ChunkTarget;
use tokio::task::{JoinError, JoinSet};

use crate::aggregate::{Event, EventSender};
use crate::partition::partition;
use crate::payload::random_payload;
use crate::pool::TokenPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub dispatched: u64,
    pub elapsed: Duration,
}

/// Fans one sweep out over the target, never holding more units in flight
/// than the pool has tokens.
#[derive(Clone)]
pub struct Dispatcher {
    target: Arc<dyn ChunkTarget>,
    pool: TokenPool,
}

impl Dispatcher {
    pub fn new(target: Arc<dyn ChunkTarget>, pool: TokenPool) -> Self {
        Self { target, pool }
    }

    /// Dispatches every range of `[0, total_chunks)` and returns once all of
    /// them have finished. Per-unit outcomes go to `events`; a fatal error from
    /// any unit aborts the rest of the sweep and is returned.
    pub async fn sweep(&self, total_chunks: u64, run: RunConfig, events: &EventSender) -> Result<SweepStats> {
        let started = Instant::now();
        let mut units = JoinSet::new();
        let mut dispatched = 0u64;

        for range in partition(total_chunks, run.chunks_per_call) {
            let token = self.pool.acquire().await?;
            let target = self.target.clone();
            let events = events.clone();
            units.spawn(async move {
                let _token = token;
                let event = dispatch(target.as_ref(), range, run).await?;
                let _ = events.send(event);
                Ok::<(), BenchError>(())
            });
            dispatched += 1;

            while let Some(joined) = units.try_join_next() {
                settle(joined)?;
            }
        }

        tracing::debug!(target: "dispatch", dispatched, "all units dispatched, draining");
        while let Some(joined) = units.join_next().await {
            settle(joined)?;
        }
        Ok(SweepStats { dispatched, elapsed: started.elapsed() })
    }
}

fn settle(joined: core::result::Result<Result<()>, JoinError>) -> Result<()> {
    joined.map_err(|e| BenchError::Join(e.to_string()))?
}

/// Pushes one range and turns the outcome into an event for the collector.
///
/// Only the network call is timed. Rejections and transport errors become
/// `Event::Failed`; fatal errors are returned.
pub async fn dispatch(target: &dyn ChunkTarget, range: ChunkRange, run: RunConfig) -> Result<Event> {
    let payload = random_payload(run.payload_len(range)?)?;
    let bytes = payload.len() as u64;

    let started = Instant::now();
    let outcome = target.put_range(range, payload).await;
    let latency = started.elapsed();

    match outcome {
        Ok(()) => {
            chunkbench_obs::record_push(latency, bytes);
            tracing::debug!(target: "dispatch", %range, ?latency, bytes, "range pushed");
            Ok(Event::Pushed { range, latency, bytes })
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            chunkbench_obs::record_failure();
            tracing::warn!(target: "dispatch", %range, "push failed: {e}");
            Ok(Event::Failed { range, error: e.to_string() })
        }
    }
}
