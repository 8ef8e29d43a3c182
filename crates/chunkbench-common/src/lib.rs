pub type Result<T> = core::result::Result<T, BenchError>;

#[derive(thiserror::Error, Debug)]
pub enum BenchError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to read config file {path}: {source}")]
    ConfigIo {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
    #[error("random payload generation failed: {0}")]
    RandomGeneration(String),
    #[error("could not build request: {0}")]
    RequestConstruction(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("status code is not 200: {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("unit of work did not finish: {0}")]
    Join(String),
}

impl BenchError {
    /// Fatal errors stop the whole benchmark. Everything else is a per-unit
    /// outcome that ends up in the report.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, BenchError::Transport(_) | BenchError::Rejected { .. })
    }
}

/// Half-open span `[start, end)` of chunk indexes sent in a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ChunkRange {
    pub start: u64,
    pub end: u64,
}

impl ChunkRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inclusive upper index, the form used on the wire.
    pub fn last(&self) -> u64 {
        self.end.saturating_sub(1)
    }
}

impl std::fmt::Display for ChunkRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.start, self.last())
    }
}

/// Parameters of one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    pub chunk_size_bytes: u64,
    pub chunks_per_call: u64,
}

impl RunConfig {
    pub fn payload_len(&self, range: ChunkRange) -> Result<u64> {
        self.chunk_size_bytes.checked_mul(range.len()).ok_or_else(|| {
            BenchError::Config(format!("{} chunks of {} bytes overflow", range.len(), self.chunk_size_bytes))
        })
    }

    /// Bytes sent by a full-size call.
    pub fn bytes_per_call(&self) -> u64 {
        self.chunk_size_bytes.saturating_mul(self.chunks_per_call)
    }
}

pub mod config {
    use super::{BenchError, Result, RunConfig};
    use serde::Deserialize;
    use std::env;
    use std::path::Path;

    pub const DEFAULT_URL: &str = "http://127.0.0.1:8787";
    /// Largest chunk the hosted block store accepts.
    pub const MAX_REMOTE_CHUNK_SIZE: u64 = 128 * 1024;
    /// Upper bound on the payload of a single call; each one is held in memory.
    pub const MAX_CALL_PAYLOAD: u64 = 1 << 30;

    #[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
    #[serde(default)]
    pub struct BenchConfig {
        pub base_url: String,
        pub total_chunks: u64,
        pub chunk_size_bytes: u64,
        pub location_hint: String,
        pub max_concurrent_pushes: usize,
        pub sweep: Vec<u64>,
    }

    impl Default for BenchConfig {
        fn default() -> Self {
            Self {
                base_url: DEFAULT_URL.to_string(),
                total_chunks: 200,
                chunk_size_bytes: MAX_REMOTE_CHUNK_SIZE,
                location_hint: "wnam".to_string(),
                max_concurrent_pushes: 5,
                sweep: vec![1, 10, 20, 30, 40, 50],
            }
        }
    }

    impl BenchConfig {
        /// Reads the file named by `CHUNKBENCH_CONFIG` if set, otherwise
        /// starts from defaults and applies `CHUNKBENCH_*` overrides.
        pub fn load() -> Result<Self> {
            if let Ok(path) = env::var("CHUNKBENCH_CONFIG") {
                return Self::from_file(path);
            }
            Self::from_lookup(|key| env::var(key).ok())
        }

        pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
            let path = path.as_ref();
            let text = std::fs::read_to_string(path).map_err(|source| BenchError::ConfigIo {
                path: path.to_path_buf(),
                source,
            })?;
            Ok(serde_yaml::from_str::<BenchConfig>(&text)?)
        }

        pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
            let mut cfg = Self::default();
            if let Some(url) = lookup("CHUNKBENCH_URL") {
                cfg.base_url = url;
            }
            if let Some(hint) = lookup("CHUNKBENCH_LOCATION_HINT") {
                cfg.location_hint = hint;
            }
            if let Some(v) = lookup("CHUNKBENCH_TOTAL_CHUNKS") { cfg.total_chunks = parse_var("CHUNKBENCH_TOTAL_CHUNKS", &v)?; }
            if let Some(v) = lookup("CHUNKBENCH_CHUNK_SIZE") { cfg.chunk_size_bytes = parse_var("CHUNKBENCH_CHUNK_SIZE", &v)?; }
            if let Some(v) = lookup("CHUNKBENCH_MAX_CONCURRENCY") { cfg.max_concurrent_pushes = parse_var("CHUNKBENCH_MAX_CONCURRENCY", &v)?; }
            if let Some(v) = lookup("CHUNKBENCH_SWEEP") { cfg.sweep = parse_sweep(&v)?; }
            Ok(cfg)
        }

        pub fn validate(&self) -> Result<()> {
            let url = self.base_url.trim();
            if url.is_empty() {
                return Err(BenchError::Config("base_url is empty".into()));
            }
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(BenchError::Config(format!("base_url must be http(s): {url}")));
            }
            if self.location_hint.trim().is_empty() {
                return Err(BenchError::Config("location_hint is empty".into()));
            }
            if self.total_chunks == 0 {
                return Err(BenchError::Config("total_chunks must be positive".into()));
            }
            if self.chunk_size_bytes == 0 {
                return Err(BenchError::Config("chunk_size_bytes must be positive".into()));
            }
            if self.max_concurrent_pushes == 0 {
                return Err(BenchError::Config("max_concurrent_pushes must be positive".into()));
            }
            if self.sweep.is_empty() {
                return Err(BenchError::Config("sweep has no chunks_per_call values".into()));
            }
            if self.sweep.contains(&0) {
                return Err(BenchError::Config("chunks_per_call values must be positive".into()));
            }
            if self.chunk_size_bytes.checked_mul(self.total_chunks).is_none() {
                return Err(BenchError::Config(format!(
                    "{} chunks of {} bytes overflow a byte count",
                    self.total_chunks, self.chunk_size_bytes
                )));
            }
            // A call never carries more than total_chunks chunks.
            let widest = self.sweep.iter().copied().max().unwrap_or(1).min(self.total_chunks);
            match self.chunk_size_bytes.checked_mul(widest) {
                Some(bytes) if bytes <= MAX_CALL_PAYLOAD => Ok(()),
                _ => Err(BenchError::Config(format!(
                    "{widest} chunks of {} bytes per call exceeds {MAX_CALL_PAYLOAD} bytes",
                    self.chunk_size_bytes
                ))),
            }
        }

        /// One `RunConfig` per sweep entry, in driving order.
        pub fn run_configs(&self) -> impl Iterator<Item = RunConfig> + '_ {
            self.sweep.iter().map(|&chunks_per_call| RunConfig {
                chunk_size_bytes: self.chunk_size_bytes,
                chunks_per_call,
            })
        }
    }

    /// Parses a comma separated list such as `1,10,20`.
    pub fn parse_sweep(text: &str) -> Result<Vec<u64>> {
        text.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| parse_var("CHUNKBENCH_SWEEP", s))
            .collect()
    }

    fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
        value
            .trim()
            .parse()
            .map_err(|_| BenchError::Config(format!("{name}: cannot parse {value:?}")))
    }

}
