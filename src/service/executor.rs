//! # Request Executor and Worker Pool
//!
//! Each dispatched request runs as its own task but must first take a permit
//! from a semaphore sized to `worker_count`, which bounds how many requests
//! execute at once. Requests waiting for a permit queue inside the semaphore
//! in arrival order.
//!
//! Execution runs in four steps:
//!
//! 1. **Cache check**: a cached payload younger than the request's freshness
//!    policy is decoded and used as-is. Missing, stale, unreadable, or
//!    undecodable entries fall through to a fetch.
//! 2. **Fetch**: the request's fetcher is invoked and the body decoded as JSON.
//! 3. **Write-back**: successful fetches are persisted, only while the
//!    dispatching generation is still running.
//! 4. **Notify**: one completion event, again only while that generation is
//!    still running.
//!
//! Nothing in here holds the pending-queue lock, and cache I/O happens on the
//! blocking pool under the cache lock only.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::events::{CompletionEvent, CompletionPublisher};
use super::lifecycle::Lifecycle;
use crate::cache::{CacheLookup, CacheStore};
use crate::error::FetchError;
use crate::logging::{log_cache_operation, log_error, log_request_operation};
use crate::requests::ResourceRequest;

#[derive(Debug, Default)]
struct PoolCounters {
    in_flight: AtomicUsize,
    executed: AtomicU64,
    abandoned: AtomicU64,
}

/// Snapshot of pool activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerPoolStats {
    pub worker_count: usize,
    pub in_flight: usize,
    pub executed: u64,
    pub abandoned: u64,
}

struct InFlightGuard(Arc<PoolCounters>);

impl InFlightGuard {
    fn enter(counters: &Arc<PoolCounters>) -> Self {
        counters.in_flight.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(counters))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Runs one request through cache check, fetch, write-back, and notify
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    cache: CacheStore,
    publisher: CompletionPublisher,
    lifecycle: Arc<Lifecycle>,
}

impl RequestExecutor {
    pub fn new(cache: CacheStore, publisher: CompletionPublisher, lifecycle: Arc<Lifecycle>) -> Self {
        Self {
            cache,
            publisher,
            lifecycle,
        }
    }

    fn is_alive(&self, generation: u64) -> bool {
        self.lifecycle.is_current(generation)
    }

    /// Execute `request` on behalf of `generation`; returns whether an event was emitted
    pub async fn execute(&self, mut request: ResourceRequest, generation: u64) -> bool {
        if !self.is_alive(generation) {
            debug!(request_key = %request.key(), generation, "Service stopped, abandoning request");
            return false;
        }

        match self.cached_payload(&request).await {
            Some(payload) => request.outcome_mut().record_cache_hit(payload),
            None => {
                if !self.is_alive(generation) {
                    debug!(request_key = %request.key(), generation, "Service stopped before fetch");
                    return false;
                }
                Self::fetch(&mut request).await;
            }
        }

        if !self.is_alive(generation) {
            debug!(
                request_key = %request.key(),
                generation,
                "Service stopped while request was in flight, discarding result"
            );
            return false;
        }

        if request.outcome().was_successful() && !request.outcome().from_cache {
            self.write_back(&request).await;
        }

        if !self.is_alive(generation) {
            return false;
        }

        let status = if request.outcome().was_successful() {
            "completed"
        } else {
            "failed"
        };
        let details = request.outcome().error.as_ref().map(|e| e.to_string());
        log_request_operation(
            "execute",
            request.id().as_str(),
            request.freshness().name(),
            status,
            details.as_deref(),
        );

        self.publisher.publish(CompletionEvent::from_request(&request));
        true
    }

    /// Decoded cached payload if the entry is fresh enough and intact
    async fn cached_payload(&self, request: &ResourceRequest) -> Option<serde_json::Value> {
        let store = self.cache.clone();
        let key = request.id().clone();
        let policy = request.freshness();
        let backend = self.cache.backend().name();

        let lookup = match tokio::task::spawn_blocking(move || store.lookup(&key, policy)).await {
            Ok(lookup) => lookup,
            Err(e) => {
                log_error("executor", "cache_check", &e.to_string(), Some(request.id().as_str()));
                return None;
            }
        };

        match lookup {
            Ok(CacheLookup::Fresh(text)) => match serde_json::from_str(&text) {
                Ok(payload) => {
                    log_cache_operation("read", request.id().as_str(), backend, "hit", None);
                    Some(payload)
                }
                Err(e) => {
                    warn!(
                        resource_id = %request.id(),
                        error = %e,
                        "Cached payload is not valid JSON, fetching instead"
                    );
                    None
                }
            },
            Ok(CacheLookup::Stale) => {
                log_cache_operation("read", request.id().as_str(), backend, "stale", None);
                None
            }
            Ok(CacheLookup::Missing) => {
                log_cache_operation("read", request.id().as_str(), backend, "miss", None);
                None
            }
            Err(e) => {
                warn!(
                    resource_id = %request.id(),
                    error = %e,
                    "Cache check failed, fetching instead"
                );
                None
            }
        }
    }

    async fn fetch(request: &mut ResourceRequest) {
        let fetcher = request.fetcher();
        debug!(request_key = %request.key(), "Fetching resource");

        match fetcher.fetch().await {
            Ok(response) if !response.status.is_success() => {
                let error = FetchError::Transport {
                    message: format!("unsuccessful response: {}", response.status),
                    status: Some(response.status),
                };
                request.outcome_mut().record_fetch_failure(error);
            }
            Ok(response) => match serde_json::from_slice(&response.body) {
                Ok(payload) => request.outcome_mut().record_fetched(response.status, payload),
                Err(e) => request
                    .outcome_mut()
                    .record_decode_failure(response.status, e.to_string()),
            },
            Err(error) => request.outcome_mut().record_fetch_failure(error),
        }
    }

    async fn write_back(&self, request: &ResourceRequest) {
        let Some(payload) = request.outcome().payload.as_ref() else {
            return;
        };
        let text = match serde_json::to_string(payload) {
            Ok(text) => text,
            Err(e) => {
                warn!(resource_id = %request.id(), error = %e, "Could not serialize payload for cache");
                return;
            }
        };

        let backend = self.cache.backend().name();
        match self.cache.write(request.id(), text).await {
            Ok(()) => log_cache_operation("write", request.id().as_str(), backend, "stored", None),
            Err(e) => {
                // The fetched result is still delivered.
                warn!(resource_id = %request.id(), error = %e, "Cache write-back failed");
                log_cache_operation(
                    "write",
                    request.id().as_str(),
                    backend,
                    "failed",
                    Some(&e.to_string()),
                );
            }
        }
    }
}

/// Fixed-size pool bounding concurrent request execution
#[derive(Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    worker_count: usize,
    executor: RequestExecutor,
    counters: Arc<PoolCounters>,
}

impl WorkerPool {
    pub fn new(worker_count: usize, executor: RequestExecutor) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(worker_count)),
            worker_count,
            executor,
            counters: Arc::new(PoolCounters::default()),
        }
    }

    /// Hand a request to the pool; it runs once a worker slot frees up
    pub fn submit(&self, request: ResourceRequest, generation: u64) -> JoinHandle<()> {
        let permits = Arc::clone(&self.permits);
        let executor = self.executor.clone();
        let counters = Arc::clone(&self.counters);

        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let _in_flight = InFlightGuard::enter(&counters);

            if executor.execute(request, generation).await {
                counters.executed.fetch_add(1, Ordering::Relaxed);
            } else {
                counters.abandoned.fetch_add(1, Ordering::Relaxed);
            }
        })
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn stats(&self) -> WorkerPoolStats {
        WorkerPoolStats {
            worker_count: self.worker_count,
            in_flight: self.counters.in_flight.load(Ordering::Acquire),
            executed: self.counters.executed.load(Ordering::Relaxed),
            abandoned: self.counters.abandoned.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::MemoryCache;
    use crate::freshness::Freshness;
    use crate::requests::{RawResponse, ResourceId};
    use serde_json::json;
    use std::time::{Duration, SystemTime};

    fn executor_with(cache: CacheStore) -> (RequestExecutor, Arc<Lifecycle>, CompletionPublisher) {
        let lifecycle = Arc::new(Lifecycle::new());
        let publisher = CompletionPublisher::new(16);
        let executor = RequestExecutor::new(cache, publisher.clone(), Arc::clone(&lifecycle));
        (executor, lifecycle, publisher)
    }

    fn json_request(id: &str, freshness: Freshness, body: &'static str) -> ResourceRequest {
        ResourceRequest::new(id, freshness, move || async move {
            Ok::<_, FetchError>(RawResponse::ok(body))
        })
    }

    #[tokio::test]
    async fn test_fetch_success_writes_back_and_notifies() {
        let cache = CacheStore::in_memory();
        let (executor, lifecycle, publisher) = executor_with(cache.clone());
        let mut events = publisher.subscribe();
        let generation = lifecycle.begin().unwrap();

        assert!(executor
            .execute(json_request("feed", Freshness::OneHour, r#"{"n":1}"#), generation)
            .await);

        let event = events.recv().await.unwrap();
        assert_eq!(event.payload, Some(json!({"n": 1})));
        assert!(!event.from_cache);
        assert_eq!(
            cache.read_sync(&ResourceId::from("feed")).unwrap().as_deref(),
            Some(r#"{"n":1}"#)
        );
    }

    #[tokio::test]
    async fn test_fresh_entry_skips_fetch() {
        let cache = CacheStore::in_memory();
        cache.write_sync(&ResourceId::from("feed"), r#"[1,2]"#).unwrap();
        let (executor, lifecycle, publisher) = executor_with(cache);
        let mut events = publisher.subscribe();
        let generation = lifecycle.begin().unwrap();

        let request = ResourceRequest::new("feed", Freshness::OneDay, || async {
            Err::<RawResponse, _>(FetchError::transport("must not be called"))
        });
        executor.execute(request, generation).await;

        let event = events.recv().await.unwrap();
        assert!(event.from_cache);
        assert!(event.status.is_none());
        assert_eq!(event.payload, Some(json!([1, 2])));
    }

    #[tokio::test]
    async fn test_stale_entry_is_refetched() {
        let backend = Arc::new(MemoryCache::new());
        let cache = CacheStore::new(backend.clone());
        let key = ResourceId::from("feed");
        cache.write_sync(&key, "\"old\"").unwrap();
        backend
            .set_last_modified(&key, SystemTime::now() - Duration::from_secs(7200))
            .unwrap();

        let (executor, lifecycle, publisher) = executor_with(cache.clone());
        let mut events = publisher.subscribe();
        let generation = lifecycle.begin().unwrap();

        executor
            .execute(json_request("feed", Freshness::OneHour, "\"new\""), generation)
            .await;

        let event = events.recv().await.unwrap();
        assert!(!event.from_cache);
        assert_eq!(event.payload, Some(json!("new")));
        assert_eq!(cache.read_sync(&key).unwrap().as_deref(), Some("\"new\""));
    }

    #[tokio::test]
    async fn test_error_status_response_is_failure() {
        let cache = CacheStore::in_memory();
        let (executor, lifecycle, publisher) = executor_with(cache.clone());
        let mut events = publisher.subscribe();
        let generation = lifecycle.begin().unwrap();

        let request = ResourceRequest::new("gone", Freshness::OneHour, || async {
            Ok::<_, FetchError>(RawResponse::new(404, "Not Found", "{}"))
        });
        executor.execute(request, generation).await;

        let event = events.recv().await.unwrap();
        assert!(!event.was_successful());
        assert_eq!(event.status.map(|s| s.code), Some(404));
        assert!(event.payload.is_none());
        assert!(!cache.contains_item(&ResourceId::from("gone")));
    }

    #[tokio::test]
    async fn test_stopped_generation_is_silent() {
        let cache = CacheStore::in_memory();
        let (executor, lifecycle, publisher) = executor_with(cache.clone());
        let mut events = publisher.subscribe();
        let generation = lifecycle.begin().unwrap();
        lifecycle.end();

        let emitted = executor
            .execute(json_request("feed", Freshness::OneHour, "1"), generation)
            .await;

        assert!(!emitted);
        assert!(events.try_recv().is_err());
        assert!(!cache.contains_item(&ResourceId::from("feed")));
    }

    #[tokio::test]
    async fn test_pool_counts_executions() {
        let cache = CacheStore::in_memory();
        let (executor, lifecycle, _publisher) = executor_with(cache);
        let generation = lifecycle.begin().unwrap();
        let pool = WorkerPool::new(2, executor);

        let handles: Vec<_> = (0..4)
            .map(|i| pool.submit(json_request(&format!("r{i}"), Freshness::OneHour, "null"), generation))
            .collect();
        for result in futures::future::join_all(handles).await {
            result.unwrap();
        }

        let stats = pool.stats();
        assert_eq!(stats.worker_count, 2);
        assert_eq!(stats.executed, 4);
        assert_eq!(stats.in_flight, 0);
    }
}
