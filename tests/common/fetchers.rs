//! Instrumented fetchers for driving the service in tests

use async_trait::async_trait;
use fetchcache::{FetchError, Fetcher, RawResponse};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Returns a fixed response and counts invocations
#[derive(Debug, Clone)]
pub struct CountingFetcher {
    calls: Arc<AtomicUsize>,
    response: Result<RawResponse, FetchError>,
}

impl CountingFetcher {
    pub fn ok(body: &str) -> Self {
        Self::responding(Ok(RawResponse::ok(body.as_bytes().to_vec())))
    }

    pub fn responding(response: Result<RawResponse, FetchError>) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            response,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for CountingFetcher {
    async fn fetch(&self) -> Result<RawResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.clone()
    }
}

/// Blocks each fetch until the test releases it
#[derive(Debug, Clone)]
pub struct GatedFetcher {
    entered: Arc<AtomicUsize>,
    gate: Arc<Semaphore>,
    body: String,
}

impl GatedFetcher {
    pub fn new(body: &str) -> Self {
        Self {
            entered: Arc::new(AtomicUsize::new(0)),
            gate: Arc::new(Semaphore::new(0)),
            body: body.to_string(),
        }
    }

    /// Fetches that have started and are waiting at the gate or past it
    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    pub fn release(&self, count: usize) {
        self.gate.add_permits(count);
    }
}

#[async_trait]
impl Fetcher for GatedFetcher {
    async fn fetch(&self) -> Result<RawResponse, FetchError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| FetchError::cancelled("gate closed"))?;
        permit.forget();
        Ok(RawResponse::ok(self.body.as_bytes().to_vec()))
    }
}

/// Tracks how many fetches run at the same time
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyTracker {
    current: Arc<AtomicUsize>,
    max: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
}

impl ConcurrencyTracker {
    pub fn max_observed(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ConcurrencyTracker {
    async fn fetch(&self) -> Result<RawResponse, FetchError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(40)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);
        Ok(RawResponse::ok(b"null".to_vec()))
    }
}
