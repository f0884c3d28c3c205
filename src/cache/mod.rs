//! # Persistent Cache
//!
//! Durable key→payload storage with freshness checks and per-key observers.
//!
//! ## Architecture
//!
//! - [`DataCache`] is the storage seam. [`FlatFileCache`] persists one file per
//!   key; [`MemoryCache`] keeps entries in process.
//! - [`CacheStore`] fronts a backend with the cache-domain lock, async helpers
//!   running on the blocking pool, and the [`ObserverRegistry`].
//!
//! The cache lock serializes every backend call made through the store. It is
//! never held while observers run and never taken while the request queue
//! lock is held.
//!
//! A missing key is a normal "no value yet" answer from the read APIs
//! (`Ok(None)`), but an error from [`DataCache::is_younger_than`].

pub mod flat_file;
pub mod key_escape;
pub mod memory;
pub mod observer;

use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{CacheError, CacheResult};
use crate::freshness::Freshness;
use crate::requests::ResourceId;

pub use flat_file::FlatFileCache;
pub use key_escape::{escape_key, unescape_key};
pub use memory::MemoryCache;
pub use observer::{CacheObserver, ObserverRegistry};

/// Storage backend for cached payloads
pub trait DataCache: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    fn contains_item(&self, key: &ResourceId) -> bool;

    /// Time of the last write to `key`; `NotFound` if absent
    fn last_modified(&self, key: &ResourceId) -> CacheResult<SystemTime>;

    /// Whether the entry is still within `policy`; `NotFound` if absent
    fn is_younger_than(&self, key: &ResourceId, policy: Freshness) -> CacheResult<bool> {
        if !self.contains_item(key) {
            return Err(CacheError::not_found(key.as_str()));
        }
        let written_at = self.last_modified(key)?;
        Ok(!policy.is_exceeded(written_at, SystemTime::now()))
    }

    /// `Ok(None)` when the key has no cached value yet
    fn read_sync(&self, key: &ResourceId) -> CacheResult<Option<String>>;

    fn write_sync(&self, key: &ResourceId, payload: &str) -> CacheResult<()>;

    /// Delete an entry, returning whether it existed
    fn remove_sync(&self, key: &ResourceId) -> CacheResult<bool>;
}

/// Result of a combined existence, freshness, and read check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Fresh(String),
    Stale,
    Missing,
}

/// Lock-guarded front for a cache backend
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn DataCache>,
    lock: Arc<Mutex<()>>,
    observers: Arc<ObserverRegistry>,
    notify_on_write: bool,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn DataCache>) -> Self {
        Self {
            backend,
            lock: Arc::new(Mutex::new(())),
            observers: Arc::new(ObserverRegistry::new()),
            notify_on_write: false,
        }
    }

    /// Store backed by files under `cache_dir`
    pub fn flat_file<P: AsRef<Path>>(cache_dir: P) -> Self {
        Self::new(Arc::new(FlatFileCache::new(cache_dir)))
    }

    /// Store backed by an in-process map
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCache::new()))
    }

    /// Fire change observers after every successful write
    pub fn with_notify_on_write(mut self, enabled: bool) -> Self {
        self.notify_on_write = enabled;
        self
    }

    pub fn backend(&self) -> &Arc<dyn DataCache> {
        &self.backend
    }

    pub fn contains_item(&self, key: &ResourceId) -> bool {
        let _guard = self.lock.lock();
        self.backend.contains_item(key)
    }

    pub fn is_younger_than(&self, key: &ResourceId, policy: Freshness) -> CacheResult<bool> {
        let _guard = self.lock.lock();
        self.backend.is_younger_than(key, policy)
    }

    pub fn read_sync(&self, key: &ResourceId) -> CacheResult<Option<String>> {
        let _guard = self.lock.lock();
        self.backend.read_sync(key)
    }

    pub fn write_sync(&self, key: &ResourceId, payload: &str) -> CacheResult<()> {
        {
            let _guard = self.lock.lock();
            self.backend.write_sync(key, payload)?;
        }

        if self.notify_on_write {
            self.observers.notify_change(key, payload);
        }
        Ok(())
    }

    /// Delete an entry; deletion observers fire when something was removed
    pub fn remove_sync(&self, key: &ResourceId) -> CacheResult<bool> {
        let removed = {
            let _guard = self.lock.lock();
            self.backend.remove_sync(key)?
        };

        if removed {
            self.observers.notify_deletion(key);
        }
        Ok(removed)
    }

    /// Existence, freshness, and read under a single lock hold
    pub fn lookup(&self, key: &ResourceId, policy: Freshness) -> CacheResult<CacheLookup> {
        let _guard = self.lock.lock();
        if !self.backend.contains_item(key) {
            return Ok(CacheLookup::Missing);
        }
        if !self.backend.is_younger_than(key, policy)? {
            return Ok(CacheLookup::Stale);
        }

        Ok(match self.backend.read_sync(key)? {
            Some(payload) => CacheLookup::Fresh(payload),
            None => CacheLookup::Missing,
        })
    }

    async fn run_blocking<T, F>(&self, key: &ResourceId, operation: F) -> CacheResult<T>
    where
        T: Send + 'static,
        F: FnOnce(CacheStore, ResourceId) -> CacheResult<T> + Send + 'static,
    {
        let store = self.clone();
        let owned_key = key.clone();
        tokio::task::spawn_blocking(move || operation(store, owned_key))
            .await
            .map_err(|e| CacheError::not_accessible(key.as_str(), format!("cache task failed: {e}")))?
    }

    /// [`read_sync`](Self::read_sync) on the blocking pool
    pub async fn read(&self, key: &ResourceId) -> CacheResult<Option<String>> {
        self.run_blocking(key, |store, key| store.read_sync(&key)).await
    }

    /// [`write_sync`](Self::write_sync) on the blocking pool
    pub async fn write(&self, key: &ResourceId, payload: String) -> CacheResult<()> {
        self.run_blocking(key, move |store, key| store.write_sync(&key, &payload))
            .await
    }

    /// Read off the caller's thread; exactly one callback runs, once
    pub fn read_async<S, E>(&self, key: ResourceId, on_success: S, on_error: E) -> JoinHandle<()>
    where
        S: FnOnce(Option<String>) + Send + 'static,
        E: FnOnce(CacheError) + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || match store.read_sync(&key) {
            Ok(payload) => on_success(payload),
            Err(e) => on_error(e),
        })
    }

    /// Write off the caller's thread; exactly one callback runs, once
    pub fn write_async<S, E>(
        &self,
        key: ResourceId,
        payload: String,
        on_success: S,
        on_error: E,
    ) -> JoinHandle<()>
    where
        S: FnOnce() + Send + 'static,
        E: FnOnce(CacheError) + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || match store.write_sync(&key, &payload) {
            Ok(()) => on_success(),
            Err(e) => on_error(e),
        })
    }

    pub fn register_observer(&self, key: &ResourceId, observer: Arc<dyn CacheObserver>) {
        debug!(resource_id = %key, "Registering cache observer");
        self.observers.register(key, observer);
    }

    pub fn unregister_observer(&self, key: &ResourceId, observer: &Arc<dyn CacheObserver>) {
        self.observers.unregister(key, observer);
    }

    pub fn unregister_observer_from_all(&self, observer: &Arc<dyn CacheObserver>) {
        self.observers.unregister_from_all(observer);
    }

    pub fn notify_observers_of_change(&self, key: &ResourceId, value: &str) {
        self.observers.notify_change(key, value);
    }

    pub fn notify_observers_of_deletion(&self, key: &ResourceId) {
        self.observers.notify_deletion(key);
    }

    pub fn observers(&self) -> &ObserverRegistry {
        &self.observers
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("backend", &self.backend.name())
            .field("notify_on_write", &self.notify_on_write)
            .finish()
    }
}
