//! Chunk sink: an in-memory stand-in for the remote block store
//!
//! Accepts the same requests the benchmark sends, so a sweep can be run
//! against a local process:
//!
//! - `PUT /{key}/{start},{end}` splits the body into `chunk_size` pieces for
//!   indexes `start..=end`; `PUT /{key}/{index}` stores the whole body.
//! - `GET /{key}/{index}` returns one stored chunk.
//! - `DELETE /{key}` drops everything stored under `key`.
//!
//! Any other method gets `404 I_DONT_UNDERSTAND`. Request bodies are not size
//! limited, a sweep may send many chunks per call.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, put},
    Router,
};
use tokio::sync::RwLock;

pub const DEFAULT_CHUNK_SIZE: usize = 128 * 1024;
const DEFAULT_LOCATION_HINT: &str = "enam";

type Blocks = HashMap<String, BTreeMap<u64, Bytes>>;

#[derive(Clone)]
pub struct SinkState {
    chunk_size: usize,
    blocks: Arc<RwLock<Blocks>>,
}

impl SinkState {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size: chunk_size.max(1), blocks: Arc::default() }
    }

    pub async fn chunk_count(&self) -> usize {
        self.blocks.read().await.values().map(BTreeMap::len).sum()
    }

    pub async fn chunk(&self, key: &str, index: u64) -> Option<Bytes> {
        self.blocks.read().await.get(key).and_then(|b| b.get(&index)).cloned()
    }

    /// Stores `body` under `start..=end` and returns how many chunks were written.
    pub async fn store_range(&self, key: &str, start: u64, end: u64, body: Bytes) -> usize {
        let mut blocks = self.blocks.write().await;
        let entry = blocks.entry(key.to_string()).or_default();
        if start == end {
            entry.insert(start, body);
            return 1;
        }
        let mut written = 0;
        for (slot, index) in (start..=end).enumerate() {
            let offset = slot * self.chunk_size;
            if offset >= body.len() {
                break;
            }
            let upper = (offset + self.chunk_size).min(body.len());
            entry.insert(index, body.slice(offset..upper));
            written += 1;
        }
        written
    }

    pub async fn free(&self, key: &str) -> usize {
        self.blocks.write().await.remove(key).map_or(0, |b| b.len())
    }
}

impl Default for SinkState {
    fn default() -> Self { Self::new(DEFAULT_CHUNK_SIZE) }
}

pub fn app(state: SinkState) -> Router {
    chunkbench_obs::init();
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/metrics", get(metrics))
        .route("/:key", delete(free_key).fallback(not_understood))
        .route("/:key/:indexes", put(put_range).get(get_chunk).fallback(not_understood))
        .fallback(not_understood)
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}

/// `start,end` or a single `index`; `end` must not precede `start`.
pub fn parse_indexes(text: &str) -> Option<(u64, u64)> {
    let (start, end) = match text.split_once(',') {
        Some((start, end)) => (start.trim().parse().ok()?, end.trim().parse().ok()?),
        None => {
            let index = text.trim().parse().ok()?;
            (index, index)
        }
    };
    (start <= end).then_some((start, end))
}

fn reply(method: &str, status: StatusCode, body: impl IntoResponse) -> Response {
    chunkbench_obs::record_sink_request(method, status.as_u16());
    (status, body).into_response()
}

fn location_hint(headers: &HeaderMap) -> &str {
    headers
        .get("x-location-hint")
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_LOCATION_HINT)
}

async fn put_range(
    State(state): State<SinkState>,
    Path((key, indexes)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some((start, end)) = parse_indexes(&indexes) else {
        return reply("PUT", StatusCode::BAD_REQUEST, "INDEX_QUERY_MALFORMED");
    };
    if body.is_empty() {
        return reply("PUT", StatusCode::BAD_REQUEST, "NEEDS_BODY");
    }
    let bytes = body.len();
    let written = state.store_range(&key, start, end, body).await;
    chunkbench_obs::set_sink_chunks(state.chunk_count().await);
    tracing::debug!(target: "sink", %key, hint = location_hint(&headers), start, end, bytes, written, "stored range");
    // Single-index writes answer lowercase, range writes uppercase.
    reply("PUT", StatusCode::OK, if start == end { "ok" } else { "OK" })
}

async fn get_chunk(State(state): State<SinkState>, Path((key, index)): Path<(String, String)>) -> Response {
    let Ok(index) = index.trim().parse::<u64>() else {
        return reply("GET", StatusCode::BAD_REQUEST, "INDEX_QUERY_MALFORMED");
    };
    match state.chunk(&key, index).await {
        Some(chunk) => reply("GET", StatusCode::OK, chunk),
        None => reply("GET", StatusCode::NOT_FOUND, "BLOCK_CHUNK_NOT_FOUND"),
    }
}

async fn free_key(State(state): State<SinkState>, Path(key): Path<String>) -> Response {
    let dropped = state.free(&key).await;
    chunkbench_obs::set_sink_chunks(state.chunk_count().await);
    tracing::info!(target: "sink", %key, dropped, "freed key");
    reply("DELETE", StatusCode::OK, "")
}

async fn not_understood(method: Method) -> Response {
    reply(method.as_str(), StatusCode::NOT_FOUND, "I_DONT_UNDERSTAND")
}

async fn metrics() -> impl IntoResponse {
    ([("content-type", "text/plain; version=0.0.4")], chunkbench_obs::render())
}
