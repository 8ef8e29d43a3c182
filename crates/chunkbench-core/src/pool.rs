use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chunkbench_common::{BenchError, Result};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Fixed number of tokens bounding how many units may run at once.
///
/// Cloning is cheap and every clone draws from the same tokens. The pool also
/// keeps the current and peak number of held tokens so callers can check the
/// bound after the fact.
#[derive(Clone)]
pub struct TokenPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl TokenPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                semaphore: Arc::new(Semaphore::new(capacity)),
                capacity,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        }
    }

    /// Waits until a token is free.
    pub async fn acquire(&self) -> Result<Token> {
        let permit = self
            .inner
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| BenchError::Join(format!("token pool closed: {e}")))?;
        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(now, Ordering::SeqCst);
        chunkbench_obs::set_in_flight(now);
        Ok(Token { pool: self.inner.clone(), _permit: permit })
    }

    pub fn capacity(&self) -> usize { self.inner.capacity }
    pub fn available(&self) -> usize { self.inner.semaphore.available_permits() }
    pub fn in_flight(&self) -> usize { self.inner.in_flight.load(Ordering::SeqCst) }
    pub fn peak_in_flight(&self) -> usize { self.inner.peak.load(Ordering::SeqCst) }
}

/// A held token. Dropping it hands the capacity back, whichever way the unit ended.
pub struct Token {
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for Token {
    fn drop(&mut self) {
        let now = self.pool.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        chunkbench_obs::set_in_flight(now);
    }
}
