use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use chunkbench_common::config::{BenchConfig, MAX_REMOTE_CHUNK_SIZE};
use chunkbench_core::{partition, run_benchmark};
use chunkbench_sink::{SinkState, DEFAULT_CHUNK_SIZE};
use chunkbench_target::HttpTarget;
use opentelemetry_otlp::WithExportConfig;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "chunkbench", version, about = "Chunked upload load generator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every sweep against the target and print the JSON report
    Run(RunArgs),
    /// Show how each sweep splits the chunk range, without sending anything
    Plan(ConfigArgs),
    /// Serve an in-memory chunk sink to benchmark against
    Serve(ServeArgs),
    Version,
}

#[derive(Args, Debug, Default)]
struct ConfigArgs {
    /// YAML config file (default: $CHUNKBENCH_CONFIG, then CHUNKBENCH_* variables)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Base URL of the block API
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    total_chunks: Option<u64>,
    #[arg(long)]
    chunk_size: Option<u64>,
    #[arg(long)]
    location_hint: Option<String>,
    /// Maximum number of requests in flight
    #[arg(short = 'j', long)]
    max_concurrency: Option<usize>,
    /// Chunks per call for each sweep, e.g. 1,10,20
    #[arg(long, value_delimiter = ',')]
    sweep: Option<Vec<u64>>,
}

impl ConfigArgs {
    fn resolve(&self) -> anyhow::Result<BenchConfig> {
        let base = match &self.config {
            Some(path) => BenchConfig::from_file(path)?,
            None => BenchConfig::load()?,
        };
        let cfg = self.apply(base);
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply(&self, mut cfg: BenchConfig) -> BenchConfig {
        if let Some(v) = &self.url { cfg.base_url = v.clone(); }
        if let Some(v) = self.total_chunks { cfg.total_chunks = v; }
        if let Some(v) = self.chunk_size { cfg.chunk_size_bytes = v; }
        if let Some(v) = &self.location_hint { cfg.location_hint = v.clone(); }
        if let Some(v) = self.max_concurrency { cfg.max_concurrent_pushes = v; }
        if let Some(v) = &self.sweep { cfg.sweep = v.clone(); }
        cfg
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    config: ConfigArgs,
    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Print prometheus metrics to stderr after the report
    #[arg(long)]
    metrics: bool,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:8787")]
    bind: SocketAddr,
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Plan(args) => plan(args),
        Commands::Serve(args) => serve(args).await,
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let cfg = args.config.resolve().context("loading configuration")?;
    if cfg.chunk_size_bytes > MAX_REMOTE_CHUNK_SIZE {
        tracing::warn!(
            chunk_size = cfg.chunk_size_bytes,
            "chunk size is above what the hosted block store accepts ({MAX_REMOTE_CHUNK_SIZE})"
        );
    }
    let target = HttpTarget::new(&cfg.base_url, &cfg.location_hint).context("building HTTP target")?;
    tracing::info!(
        url = %cfg.base_url,
        total_chunks = cfg.total_chunks,
        max_concurrency = cfg.max_concurrent_pushes,
        sweep = ?cfg.sweep,
        "starting benchmark"
    );

    let report = run_benchmark(&cfg, Arc::new(target)).await.context("benchmark aborted")?;
    for s in report.summaries() {
        tracing::info!(
            chunks_per_call = s.config_used.chunks_per_call,
            avg = ?s.avg_time_per_push,
            total = ?s.total_time_push,
            bytes = s.total_data_transferred_bytes,
            failed = s.failed_units,
            "sweep summary"
        );
    }

    let json = report.to_json_pretty().context("serializing report")?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing report to {}", path.display()))?;
            tracing::info!("report written to {}", path.display());
        }
        None => println!("{json}"),
    }
    if args.metrics {
        eprint!("{}", chunkbench_obs::render());
    }
    Ok(())
}

fn plan(args: ConfigArgs) -> anyhow::Result<()> {
    let cfg = args.resolve().context("loading configuration")?;
    println!("target: {} (hint {}), {} chunks of {} bytes", cfg.base_url, cfg.location_hint, cfg.total_chunks, cfg.chunk_size_bytes);
    for run in cfg.run_configs() {
        let ranges = partition(cfg.total_chunks, run.chunks_per_call);
        let units = ranges.len();
        let first = ranges.clone().next().map(|r| r.to_string()).unwrap_or_default();
        let last = ranges.last().map(|r| r.to_string()).unwrap_or_default();
        println!(
            "chunks_per_call={:<4} units={:<6} bytes_per_call={:<10} first=[{}] last=[{}]",
            run.chunks_per_call,
            units,
            run.bytes_per_call(),
            first,
            last
        );
    }
    Ok(())
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let app = chunkbench_sink::app(SinkState::new(args.chunk_size));
    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    tracing::info!("chunk sink listening on http://{}", args.bind);
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
    };
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("sink server failed")
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );

    if let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint))
            .install_simple()
            .ok();
        if let Some(tracer) = tracer {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .with(OpenTelemetryLayer::new(tracer))
                .init();
            return;
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
