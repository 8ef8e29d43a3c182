use std::time::Duration;

use chunkbench_common::{BenchError, ChunkRange, Result, RunConfig};
use serde::{Serialize, Serializer};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// What units and the driver tell the collector.
#[derive(Debug, Clone)]
pub enum Event {
    Pushed { range: ChunkRange, latency: Duration, bytes: u64 },
    Failed { range: ChunkRange, error: String },
    SweepFinished { run: RunConfig, dispatched: u64, total_time: Duration, concurrent_jobs: usize },
}

pub type EventSender = mpsc::UnboundedSender<Event>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResultRecord {
    #[serde(rename_all = "camelCase")]
    Failure { range: ChunkRange, error: String },
    Summary(SweepSummary),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepSummary {
    pub config_used: RunConfig,
    #[serde(rename = "avgTimePerPushMs", serialize_with = "as_millis")]
    pub avg_time_per_push: Duration,
    #[serde(rename = "totalTimePushMs", serialize_with = "as_millis")]
    pub total_time_push: Duration,
    pub total_data_transferred_bytes: u64,
    pub concurrent_jobs: usize,
    pub dispatched_units: u64,
    pub successful_units: u64,
    pub failed_units: u64,
}

fn as_millis<S: Serializer>(d: &Duration, s: S) -> core::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_nanos() as f64 / 1e6)
}

/// Running totals for the sweep currently being driven.
#[derive(Debug, Default)]
struct SweepAccumulator {
    latency_sum: Duration,
    successes: u64,
    failures: u64,
    bytes: u64,
}

impl SweepAccumulator {
    fn summarize(&mut self, run: RunConfig, dispatched: u64, total_time: Duration, concurrent_jobs: usize) -> SweepSummary {
        let acc = std::mem::take(self);
        // Failed units have no latency sample, so they stay out of the divisor.
        let avg_time_per_push = if acc.successes == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos((acc.latency_sum.as_nanos() / u128::from(acc.successes)) as u64)
        };
        SweepSummary {
            config_used: run,
            avg_time_per_push,
            total_time_push: total_time,
            total_data_transferred_bytes: acc.bytes,
            concurrent_jobs,
            dispatched_units: dispatched,
            successful_units: acc.successes,
            failed_units: acc.failures,
        }
    }
}

/// Single consumer of the event channel; owns the record list.
pub async fn collect(mut rx: mpsc::UnboundedReceiver<Event>) -> Vec<ResultRecord> {
    let mut records = Vec::new();
    let mut current = SweepAccumulator::default();
    while let Some(event) = rx.recv().await {
        match event {
            Event::Pushed { latency, bytes, .. } => {
                current.latency_sum += latency;
                current.successes += 1;
                current.bytes += bytes;
            }
            Event::Failed { range, error } => {
                current.failures += 1;
                records.push(ResultRecord::Failure { range, error });
            }
            Event::SweepFinished { run, dispatched, total_time, concurrent_jobs } => {
                records.push(ResultRecord::Summary(current.summarize(run, dispatched, total_time, concurrent_jobs)));
            }
        }
    }
    records
}

pub struct Collector {
    tx: EventSender,
    handle: JoinHandle<Vec<ResultRecord>>,
}

impl Collector {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(collect(rx));
        Self { tx, handle }
    }

    pub fn sender(&self) -> EventSender { self.tx.clone() }

    /// Closes the channel and waits for the collector to drain it.
    ///
    /// Every other sender must already be dropped, otherwise this waits forever.
    pub async fn finish(self) -> Result<Vec<ResultRecord>> {
        drop(self.tx);
        self.handle.await.map_err(|e| BenchError::Join(format!("collector: {e}")))
    }
}
