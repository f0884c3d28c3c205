//! # FetchCache Configuration System
//!
//! Layered configuration for the fetch service, resolved in this order (later
//! layers win):
//!
//! 1. Built-in defaults ([`ServiceConfig::default`])
//! 2. `config/fetchcache.toml`, if present
//! 3. `config/fetchcache.<environment>.toml`, if present
//! 4. `FETCHCACHE__*` environment variables, e.g. `FETCHCACHE__WORKER_COUNT=8`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fetchcache::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let workers = manager.config().worker_count;
//! # Ok(())
//! # }
//! ```

pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::system;
use crate::freshness::Freshness;

pub use crate::error::ConfigurationError;
pub use loader::ConfigManager;

pub type ConfigResult<T> = std::result::Result<T, ConfigurationError>;

/// Settings for one fetch service instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Maximum number of requests executing at once
    pub worker_count: usize,
    /// Directory holding the flat-file cache
    pub cache_dir: PathBuf,
    /// Completion events buffered per subscriber before it starts lagging
    pub event_buffer_size: usize,
    /// Fire change observers after every successful cache write
    pub notify_observers_on_write: bool,
    /// Freshness used by [`crate::service::FetchService::request`]
    pub default_freshness: Freshness,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            worker_count: system::DEFAULT_WORKER_COUNT,
            cache_dir: std::env::temp_dir().join(system::DEFAULT_CACHE_DIR_NAME),
            event_buffer_size: system::DEFAULT_EVENT_BUFFER_SIZE,
            notify_observers_on_write: false,
            default_freshness: Freshness::default(),
        }
    }
}

impl ServiceConfig {
    /// Default settings with the cache rooted at `cache_dir`
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.worker_count == 0 || self.worker_count > system::MAX_WORKER_COUNT {
            return Err(ConfigurationError::invalid_value(
                "worker_count",
                self.worker_count.to_string(),
                format!("must be between 1 and {}", system::MAX_WORKER_COUNT),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "event_buffer_size",
                "0",
                "must be greater than 0",
            ));
        }

        if self.cache_dir.as_os_str().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "cache_dir",
                "",
                "must not be empty",
            ));
        }

        Ok(())
    }
}
