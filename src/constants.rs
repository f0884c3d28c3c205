//! # System Constants
//!
//! Operational boundaries of the fetch service and the naming used for
//! completion events and on-disk cache entries.

/// Service-level limits and defaults
pub mod system {
    /// Version compatibility marker
    pub const FETCHCACHE_CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Number of requests allowed in cache-check/fetch/cache-write at once
    pub const DEFAULT_WORKER_COUNT: usize = 3;

    /// Upper bound accepted by configuration validation
    pub const MAX_WORKER_COUNT: usize = 256;

    /// Completion events buffered per subscriber before it starts lagging
    pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 1000;

    /// Directory name used under the system temp dir when none is configured
    pub const DEFAULT_CACHE_DIR_NAME: &str = "fetchcache";
}

/// Flat-file cache naming
pub mod cache_layout {
    /// Escape character for the reversible key-to-filename mapping
    pub const ESCAPE_CHAR: char = '%';

    /// Prefix of in-progress write files; escaped keys never start with it
    pub const TEMP_FILE_PREFIX: &str = ".";

    /// Suffix of in-progress write files
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";
}

/// Completion event names, used as `event_type` in structured logs
pub mod events {
    pub const REQUEST_COMPLETED: &str = "request.completed";
    pub const REQUEST_FAILED: &str = "request.failed";
}

/// Environment variables understood by logging and configuration
pub mod env {
    /// Selects the configuration overlay and default log level
    pub const ENVIRONMENT: &str = "FETCHCACHE_ENV";

    /// `json` switches console output to JSON lines
    pub const LOG_FORMAT: &str = "FETCHCACHE_LOG_FORMAT";

    /// Prefix for configuration overrides, e.g. `FETCHCACHE__WORKER_COUNT=8`
    pub const CONFIG_PREFIX: &str = "FETCHCACHE";
}
