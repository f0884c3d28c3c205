//! # Error Types
//!
//! Structured error handling for the fetch service using thiserror.
//!
//! Cache errors are recovered inside the request pipeline and only surface
//! through the direct cache API. Fetch and decode errors are terminal for a
//! request and travel to listeners inside its completion event, which is why
//! `RequestError` is `Clone`.

use thiserror::Error;

use crate::requests::ResponseStatus;

/// Failures of the persistent cache
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache entry not found: {key}")]
    NotFound { key: String },

    #[error("Cannot access cache for {key}: {message}")]
    NotAccessible { key: String, message: String },

    #[error("Cache entry for {key} is corrupt or unreadable: {message}")]
    CorruptOrUnreadable { key: String, message: String },

    #[error("Failed writing cache entry for {key}: {message}")]
    WriteFailed { key: String, message: String },
}

impl CacheError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn not_accessible(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotAccessible {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn corrupt_or_unreadable(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptOrUnreadable {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn write_failed(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Key the failure refers to
    pub fn key(&self) -> &str {
        match self {
            Self::NotFound { key }
            | Self::NotAccessible { key, .. }
            | Self::CorruptOrUnreadable { key, .. }
            | Self::WriteFailed { key, .. } => key,
        }
    }
}

/// Failures reported by a fetcher
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The transport failed, or a response arrived carrying an error status.
    /// In the latter case `status` holds the response's code and phrase.
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        status: Option<ResponseStatus>,
    },

    #[error("Fetch cancelled: {reason}")]
    Cancelled { reason: String },
}

impl FetchError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
        }
    }

    /// An error-status response: transport succeeded, the server said no
    pub fn error_status(code: u16, phrase: impl Into<String>) -> Self {
        let status = ResponseStatus::new(code, phrase);
        Self::Transport {
            message: format!("server responded with {status}"),
            status: Some(status),
        }
    }

    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// Status obtained before the failure, if any
    pub fn status(&self) -> Option<&ResponseStatus> {
        match self {
            Self::Transport { status, .. } => status.as_ref(),
            Self::Cancelled { .. } => None,
        }
    }
}

/// Terminal failure of a single request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Payload decode error: {message}")]
    Decode { message: String },
}

impl RequestError {
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}

/// Configuration loading and validation failures
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {message}")]
    Load { message: String },

    #[error("Invalid configuration value for {field}: {value}: {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

impl ConfigurationError {
    pub fn load(message: impl Into<String>) -> Self {
        Self::Load {
            message: message.into(),
        }
    }

    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(err: config::ConfigError) -> Self {
        Self::load(err.to_string())
    }
}

/// Crate-level error
#[derive(Error, Debug)]
pub enum FetchCacheError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, FetchCacheError>;

pub type CacheResult<T> = std::result::Result<T, CacheError>;
