//! Observability utilities: push and sink metrics

use std::time::Duration;

use once_cell::sync::Lazy;
use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

static REGISTRY: Lazy<Registry> =
    Lazy::new(|| Registry::new_custom(Some("chunkbench".into()), None).expect("registry"));

static PUSHES: Lazy<IntCounter> = Lazy::new(|| {
    prometheus::register_int_counter_with_registry!("pushes_total", "Ranges accepted by the target", REGISTRY)
        .expect("counter")
});
static PUSH_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    prometheus::register_int_counter_with_registry!(
        "push_failures_total",
        "Ranges that failed in transport or were rejected",
        REGISTRY
    )
    .expect("counter")
});
static BYTES_PUSHED: Lazy<IntCounter> = Lazy::new(|| {
    prometheus::register_int_counter_with_registry!("bytes_pushed_total", "Payload bytes accepted by the target", REGISTRY)
        .expect("counter")
});
static IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    prometheus::register_int_gauge_with_registry!("pushes_in_flight", "Units currently holding a token", REGISTRY)
        .expect("gauge")
});
static PUSH_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    let opts = HistogramOpts::new("push_latency_seconds", "Latency of accepted range pushes")
        .buckets(exponential_buckets(0.001, 2.0, 16).expect("buckets"));
    prometheus::register_histogram_with_registry!(opts, REGISTRY).expect("histogram")
});
static SINK_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    prometheus::register_int_counter_vec_with_registry!(
        Opts::new("sink_requests_total", "Requests served by the chunk sink"),
        &["method", "status"],
        REGISTRY
    )
    .expect("counter")
});
static SINK_CHUNKS: Lazy<IntGauge> = Lazy::new(|| {
    prometheus::register_int_gauge_with_registry!("sink_chunks_stored", "Chunks held by the sink", REGISTRY)
        .expect("gauge")
});

pub fn init() {
    // Touch statics so every metric shows up in the first scrape.
    let _ = &*PUSHES;
    let _ = &*PUSH_FAILURES;
    let _ = &*BYTES_PUSHED;
    let _ = &*IN_FLIGHT;
    let _ = &*PUSH_LATENCY;
    let _ = &*SINK_REQUESTS;
    let _ = &*SINK_CHUNKS;
}

pub fn record_push(latency: Duration, bytes: u64) {
    PUSHES.inc();
    BYTES_PUSHED.inc_by(bytes);
    PUSH_LATENCY.observe(latency.as_secs_f64());
}

pub fn record_failure() { PUSH_FAILURES.inc(); }

pub fn set_in_flight(units: usize) { IN_FLIGHT.set(units as i64); }

pub fn record_sink_request(method: &str, status: u16) {
    let status = status.to_string();
    SINK_REQUESTS.with_label_values(&[method, status.as_str()]).inc();
}

pub fn set_sink_chunks(chunks: usize) { SINK_CHUNKS.set(chunks as i64); }

/// Prometheus text exposition of every chunkbench metric.
pub fn render() -> String {
    init();
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer) {
        tracing::warn!(target: "obs", "metric encoding failed: {e}");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
