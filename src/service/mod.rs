//! # Fetch Service
//!
//! Accepts resource requests, collapses duplicates while they wait, executes
//! them on a bounded worker pool against a freshness-aware cache, and
//! broadcasts one completion event per executed request.
//!
//! ## Lifecycle
//!
//! - Requests can be added at any time. While the service is stopped they
//!   simply wait in the pending set.
//! - [`FetchService::start`] spawns a dispatcher for a new generation.
//!   Calling it while running does nothing.
//! - [`FetchService::stop`] is idempotent and safe without a prior start.
//!   Work already dispatched is allowed to finish, but its results are
//!   neither cached nor announced.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fetchcache::config::ServiceConfig;
//! use fetchcache::freshness::Freshness;
//! use fetchcache::requests::{RawResponse, ResourceRequest};
//! use fetchcache::error::FetchError;
//! use fetchcache::service::FetchService;
//!
//! # async fn example() -> fetchcache::error::Result<()> {
//! let service = FetchService::new(ServiceConfig::with_cache_dir("/tmp/feeds"))?;
//! let mut events = service.subscribe();
//! service.start()?;
//!
//! service.add_request(ResourceRequest::new("feed/latest", Freshness::OneHour, || async {
//!     Ok::<_, FetchError>(RawResponse::ok(r#"{"items":[]}"#))
//! }));
//!
//! if let Ok(event) = events.recv().await {
//!     println!("{} from_cache={}", event.resource_id, event.from_cache);
//! }
//! service.stop();
//! # Ok(())
//! # }
//! ```

pub mod dispatcher;
pub mod events;
pub mod executor;
pub mod lifecycle;
pub mod pending;

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::cache::CacheStore;
use crate::config::ServiceConfig;
use crate::error::{FetchCacheError, Result};
use crate::requests::{Fetcher, RequestKey, ResourceId, ResourceRequest};

use dispatcher::Dispatcher;
use events::{CompletionEvent, CompletionPublisher};
use executor::{RequestExecutor, WorkerPool};
use lifecycle::Lifecycle;
use pending::PendingRequests;

/// Point-in-time view of service activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceStats {
    pub running: bool,
    pub generation: u64,
    pub pending: usize,
    pub in_flight: usize,
    pub executed: u64,
    pub abandoned: u64,
    pub events_published: u64,
    pub subscribers: usize,
}

/// Deduplicating, bounded-concurrency fetch service
pub struct FetchService {
    config: ServiceConfig,
    cache: CacheStore,
    pending: Arc<PendingRequests>,
    pool: Arc<WorkerPool>,
    publisher: CompletionPublisher,
    lifecycle: Arc<Lifecycle>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl FetchService {
    /// Build a service backed by a flat-file cache in `config.cache_dir`
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let cache = CacheStore::flat_file(&config.cache_dir);
        Self::with_cache(config, cache)
    }

    /// Build a service around an existing cache store
    pub fn with_cache(config: ServiceConfig, cache: CacheStore) -> Result<Self> {
        config.validate()?;

        let cache = if config.notify_observers_on_write {
            cache.with_notify_on_write(true)
        } else {
            cache
        };
        let lifecycle = Arc::new(Lifecycle::new());
        let publisher = CompletionPublisher::new(config.event_buffer_size);
        let executor =
            RequestExecutor::new(cache.clone(), publisher.clone(), Arc::clone(&lifecycle));
        let pool = Arc::new(WorkerPool::new(config.worker_count, executor));

        debug!(
            worker_count = config.worker_count,
            cache_backend = cache.backend().name(),
            event_buffer_size = config.event_buffer_size,
            "Fetch service created"
        );

        Ok(Self {
            config,
            cache,
            pending: Arc::new(PendingRequests::new()),
            pool,
            publisher,
            lifecycle,
            dispatcher: Mutex::new(None),
        })
    }

    /// Begin dispatching pending requests
    ///
    /// Must be called from within a Tokio runtime.
    #[instrument(skip(self))]
    pub fn start(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            FetchCacheError::InvalidState(format!("start requires a Tokio runtime: {e}"))
        })?;

        let Some(generation) = self.lifecycle.begin() else {
            debug!("Fetch service already running");
            return Ok(());
        };

        let dispatcher = Dispatcher::new(
            Arc::clone(&self.pending),
            Arc::clone(&self.pool),
            Arc::clone(&self.lifecycle),
            generation,
        );
        *self.dispatcher.lock() = Some(runtime.spawn(dispatcher.run()));

        info!(
            generation,
            worker_count = self.pool.worker_count(),
            pending = self.pending.len(),
            "✅ Fetch service started"
        );
        Ok(())
    }

    /// Stop dispatching and silence in-flight work
    #[instrument(skip(self))]
    pub fn stop(&self) {
        if !self.lifecycle.end() {
            debug!("Fetch service not running, nothing to stop");
            return;
        }

        self.pending.wake_all();
        // The dispatcher exits on its own once woken.
        drop(self.dispatcher.lock().take());

        info!(
            generation = self.lifecycle.generation(),
            pending = self.pending.len(),
            "🛑 Fetch service stopped"
        );
    }

    /// Queue a request; `false` if an equal request is already waiting
    pub fn add_request(&self, request: ResourceRequest) -> bool {
        self.pending.enqueue(request)
    }

    /// Build a request using the configured default freshness
    pub fn request<F>(&self, id: impl Into<ResourceId>, fetcher: F) -> ResourceRequest
    where
        F: Fetcher + 'static,
    {
        ResourceRequest::new(id, self.config.default_freshness, fetcher)
    }

    pub fn is_pending(&self, key: &RequestKey) -> bool {
        self.pending.contains(key)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CompletionEvent> {
        self.publisher.subscribe()
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    pub fn stats(&self) -> ServiceStats {
        let pool = self.pool.stats();
        let publisher = self.publisher.stats();
        ServiceStats {
            running: self.lifecycle.is_running(),
            generation: self.lifecycle.generation(),
            pending: self.pending.len(),
            in_flight: pool.in_flight,
            executed: pool.executed,
            abandoned: pool.abandoned,
            events_published: publisher.published,
            subscribers: publisher.subscribers,
        }
    }
}

impl Drop for FetchService {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for FetchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchService")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("stats", &self.stats())
            .finish()
    }
}
