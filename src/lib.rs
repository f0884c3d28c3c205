#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # FetchCache Core
//!
//! Deduplicating, bounded-concurrency resource fetch service with a
//! freshness-aware persistent cache.
//!
//! ## Overview
//!
//! Callers submit [`ResourceRequest`]s naming a resource, a [`Freshness`]
//! policy, and a fetch operation. The [`FetchService`] keeps an ordered,
//! duplicate-free set of pending requests, hands them to a fixed-size worker
//! pool, and for each one either answers from the cache (when the cached copy
//! is young enough) or fetches, stores the result, and broadcasts a
//! [`CompletionEvent`] to every subscriber.
//!
//! ## Module Organization
//!
//! - [`service`] - Service lifecycle, pending set, dispatcher, and worker pool
//! - [`cache`] - Cache backends, the cache store, and change observers
//! - [`requests`] - Requests, responses, and the fetcher seam
//! - [`freshness`] - Staleness policies
//! - [`config`] - Layered configuration loading
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//! - [`constants`] - Shared defaults and names
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fetchcache::{
//!     FetchError, FetchService, Freshness, RawResponse, ResourceRequest, ServiceConfig,
//! };
//!
//! # async fn example() -> fetchcache::Result<()> {
//! fetchcache::logging::init_structured_logging();
//!
//! let service = FetchService::new(ServiceConfig::default())?;
//! let mut events = service.subscribe();
//! service.start()?;
//!
//! let request = ResourceRequest::new("quotes/today", Freshness::OneDay, || async {
//!     Ok::<_, FetchError>(RawResponse::ok(r#"{"quote":"hello"}"#))
//! });
//! service.add_request(request);
//!
//! let event = events.recv().await.expect("event");
//! assert!(event.was_successful());
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test
//! cargo bench --features benchmarks
//! ```

pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod freshness;
pub mod logging;
pub mod requests;
pub mod service;

pub use cache::{CacheLookup, CacheObserver, CacheStore, DataCache, FlatFileCache, MemoryCache};
pub use config::{ConfigManager, ServiceConfig};
pub use error::{
    CacheError, ConfigurationError, FetchCacheError, FetchError, RequestError, Result,
};
pub use freshness::Freshness;
pub use requests::{
    Fetcher, RawResponse, RequestKey, RequestOutcome, ResourceId, ResourceRequest, ResponseStatus,
};
pub use service::events::{CompletionEvent, CompletionPublisher};
pub use service::{FetchService, ServiceStats};
