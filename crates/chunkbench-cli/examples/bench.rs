//! Runs a small sweep against `URL`, or against an in-process sink when
//! `URL` is unset.

use std::sync::Arc;

use chunkbench_common::config::BenchConfig;
use chunkbench_core::run_benchmark;
use chunkbench_sink::{app, SinkState};
use chunkbench_target::HttpTarget;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let total_chunks: u64 = std::env::var("N").ok().and_then(|v| v.parse().ok()).unwrap_or(64);
    let chunk_size: u64 = 16 * 1024;

    let base_url = match std::env::var("URL") {
        Ok(url) => url,
        Err(_) => {
            let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await?;
            let addr = listener.local_addr()?;
            let sink = app(SinkState::new(chunk_size as usize));
            tokio::spawn(async move { axum::serve(listener, sink).await });
            format!("http://{addr}")
        }
    };

    let cfg = BenchConfig {
        base_url,
        total_chunks,
        chunk_size_bytes: chunk_size,
        sweep: vec![1, 4, 16],
        ..BenchConfig::default()
    };
    let target = Arc::new(HttpTarget::new(&cfg.base_url, &cfg.location_hint)?);
    let report = run_benchmark(&cfg, target).await?;
    println!("{}", report.to_json_pretty()?);
    Ok(())
}
