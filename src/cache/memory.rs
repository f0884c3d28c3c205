//! In-process cache backend
//!
//! Not durable. Useful for embedding the service where no disk is wanted and
//! in tests that need to control entry ages without touching file times.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::SystemTime;

use super::DataCache;
use crate::error::{CacheError, CacheResult};
use crate::requests::ResourceId;

#[derive(Debug, Clone)]
struct MemoryEntry {
    payload: String,
    last_modified: SystemTime,
}

/// Cache held in a map guarded by a read/write lock
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<ResourceId, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override an entry's modification time
    pub fn set_last_modified(&self, key: &ResourceId, at: SystemTime) -> CacheResult<()> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(key)
            .ok_or_else(|| CacheError::not_found(key.as_str()))?;
        entry.last_modified = at;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl DataCache for MemoryCache {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn contains_item(&self, key: &ResourceId) -> bool {
        self.entries.read().contains_key(key)
    }

    fn last_modified(&self, key: &ResourceId) -> CacheResult<SystemTime> {
        self.entries
            .read()
            .get(key)
            .map(|entry| entry.last_modified)
            .ok_or_else(|| CacheError::not_found(key.as_str()))
    }

    fn read_sync(&self, key: &ResourceId) -> CacheResult<Option<String>> {
        Ok(self.entries.read().get(key).map(|entry| entry.payload.clone()))
    }

    fn write_sync(&self, key: &ResourceId, payload: &str) -> CacheResult<()> {
        self.entries.write().insert(
            key.clone(),
            MemoryEntry {
                payload: payload.to_string(),
                last_modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn remove_sync(&self, key: &ResourceId) -> CacheResult<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }
}
