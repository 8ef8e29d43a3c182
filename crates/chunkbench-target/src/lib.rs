//! Destinations for chunk pushes: the HTTP block API and an in-process mock.

use async_trait::async_trait;
use chunkbench_common::{BenchError, ChunkRange, Result};
use reqwest::{header::HeaderValue, Client, StatusCode, Url};

pub const LOCATION_HINT_HEADER: &str = "X-Location-Hint";

/// Something that accepts a contiguous range of chunks in one call.
///
/// Implementations return `Ok(())` only when the remote side accepted the
/// whole range. `Transport` and `Rejected` errors are per-call outcomes; any
/// other error means the benchmark itself is misconfigured.
#[async_trait]
pub trait ChunkTarget: Send + Sync {
    async fn put_range(&self, range: ChunkRange, payload: Vec<u8>) -> Result<()>;
}

/// PUTs ranges to `{base}/{hint}-location/{start},{end_inclusive}`.
#[derive(Debug, Clone)]
pub struct HttpTarget {
    client: Client,
    base: Url,
    location_hint: HeaderValue,
}

impl HttpTarget {
    pub fn new(base_url: &str, location_hint: &str) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| BenchError::RequestConstruction(e.to_string()))?;
        Self::with_client(client, base_url, location_hint)
    }

    pub fn with_client(client: Client, base_url: &str, location_hint: &str) -> Result<Self> {
        let mut base = Url::parse(base_url)
            .map_err(|e| BenchError::RequestConstruction(format!("{base_url}: {e}")))?;
        base.path_segments_mut()
            .map_err(|_| BenchError::RequestConstruction(format!("{base_url} cannot be a base url")))?
            .pop_if_empty()
            .push(&format!("{location_hint}-location"));
        let location_hint = HeaderValue::from_str(location_hint)
            .map_err(|e| BenchError::RequestConstruction(format!("location hint {location_hint:?}: {e}")))?;
        Ok(Self { client, base, location_hint })
    }

    pub fn range_url(&self, range: ChunkRange) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| BenchError::RequestConstruction(format!("{} cannot be a base url", self.base)))?
            .push(&range.to_string());
        Ok(url)
    }
}

#[async_trait]
impl ChunkTarget for HttpTarget {
    async fn put_range(&self, range: ChunkRange, payload: Vec<u8>) -> Result<()> {
        let url = self.range_url(range)?;
        let res = self
            .client
            .put(url)
            .header(LOCATION_HINT_HEADER, self.location_hint.clone())
            .body(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    BenchError::RequestConstruction(e.to_string())
                } else {
                    BenchError::Transport(e.to_string())
                }
            })?;

        let status = res.status();
        if status != StatusCode::OK {
            let body = match res.text().await {
                Ok(body) => body,
                Err(e) => format!("<couldn't read body>: {e}"),
            };
            tracing::debug!(target: "target", %range, status = status.as_u16(), "range rejected");
            return Err(BenchError::Rejected { status: status.as_u16(), body });
        }
        Ok(())
    }
}

#[cfg(feature = "mock")]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, PoisonError};
    use std::time::Duration;

    #[derive(Debug, Clone)]
    pub enum MockFailure {
        Reject { status: u16, body: String },
        Transport(String),
        /// Fails like a misbuilt request would; the dispatcher treats it as fatal.
        Construction(String),
    }

    /// In-memory target that records every call and tracks how many calls
    /// overlapped.
    #[derive(Default)]
    pub struct MockTarget {
        latency: Duration,
        failures: HashMap<ChunkRange, MockFailure>,
        received: Mutex<Vec<(ChunkRange, usize)>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl MockTarget {
        pub fn new() -> Self { Self::default() }

        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        pub fn reject(mut self, range: ChunkRange, status: u16, body: impl Into<String>) -> Self {
            self.failures.insert(range, MockFailure::Reject { status, body: body.into() });
            self
        }

        pub fn fail_transport(mut self, range: ChunkRange, message: impl Into<String>) -> Self {
            self.failures.insert(range, MockFailure::Transport(message.into()));
            self
        }

        pub fn fail_construction(mut self, range: ChunkRange, message: impl Into<String>) -> Self {
            self.failures.insert(range, MockFailure::Construction(message.into()));
            self
        }

        /// Ranges and payload sizes in arrival order.
        pub fn received(&self) -> Vec<(ChunkRange, usize)> {
            self.received.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }

        pub fn calls(&self) -> usize {
            self.received.lock().unwrap_or_else(PoisonError::into_inner).len()
        }

        pub fn peak_concurrency(&self) -> usize { self.peak.load(Ordering::SeqCst) }
    }

    #[async_trait]
    impl ChunkTarget for MockTarget {
        async fn put_range(&self, range: ChunkRange, payload: Vec<u8>) -> Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.received
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((range, payload.len()));
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match self.failures.get(&range) {
                None => Ok(()),
                Some(MockFailure::Reject { status, body }) => {
                    Err(BenchError::Rejected { status: *status, body: body.clone() })
                }
                Some(MockFailure::Transport(msg)) => Err(BenchError::Transport(msg.clone())),
                Some(MockFailure::Construction(msg)) => Err(BenchError::RequestConstruction(msg.clone())),
            }
        }
    }
}
