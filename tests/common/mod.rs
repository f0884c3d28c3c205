//! Shared helpers for integration tests
#![allow(dead_code)]

pub mod fetchers;
pub mod strategies;

use fetchcache::{CacheStore, CompletionEvent, FetchService, MemoryCache, ServiceConfig};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;

pub use fetchers::*;

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Service over an in-memory cache so tests can control entry ages
pub fn memory_service(worker_count: usize) -> (FetchService, Arc<MemoryCache>) {
    let backend = Arc::new(MemoryCache::new());
    let config = ServiceConfig {
        worker_count,
        ..ServiceConfig::default()
    };
    let service = FetchService::with_cache(config, CacheStore::new(backend.clone()))
        .expect("valid test config");
    (service, backend)
}

/// Service over a flat-file cache in a fresh temporary directory
pub fn flat_file_service(worker_count: usize) -> (FetchService, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir");
    let config = ServiceConfig {
        worker_count,
        ..ServiceConfig::with_cache_dir(temp_dir.path())
    };
    let service = FetchService::new(config).expect("valid test config");
    (service, temp_dir)
}

/// Next completion event, failing the test if none arrives in time
pub async fn next_event(events: &mut broadcast::Receiver<CompletionEvent>) -> CompletionEvent {
    tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for completion event")
        .expect("event channel closed or lagged")
}

/// Collect exactly `count` events
pub async fn collect_events(
    events: &mut broadcast::Receiver<CompletionEvent>,
    count: usize,
) -> Vec<CompletionEvent> {
    let mut collected = Vec::with_capacity(count);
    for _ in 0..count {
        collected.push(next_event(events).await);
    }
    collected
}

/// Assert that no event arrives within `window`
pub async fn assert_no_event(events: &mut broadcast::Receiver<CompletionEvent>, window: Duration) {
    if let Ok(result) = tokio::time::timeout(window, events.recv()).await {
        panic!("unexpected completion event: {result:?}");
    }
}

/// Poll `condition` until it holds or the event timeout elapses
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met before timeout"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
