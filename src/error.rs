// src/error.rs

//! Unified error handling for the feed ingestion service.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Failure while retrieving the raw feed.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection, TLS, or body transfer failed
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The request exceeded the configured timeout
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The endpoint answered with a non-2xx status
    #[error("upstream returned HTTP {0}")]
    Status(u16),
}

impl FetchError {
    /// Classify a transport error, separating timeouts from other failures.
    pub fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout { secs: timeout_secs }
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Network(err)
        }
    }
}

/// Failure while reading the persisted snapshot.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No snapshot has been written yet
    #[error("snapshot not found at {}", .0.display())]
    Missing(PathBuf),

    /// The document exists but does not deserialize
    #[error("snapshot at {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Feed retrieval failed
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Snapshot could not be read
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Circuit breaker refused to replace the stored snapshot
    #[error("Circuit breaker: {0}")]
    CircuitBreaker(String),

    /// Failure of an in-flight run that this caller joined
    #[error("{0}")]
    Joined(Arc<AppError>),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a circuit breaker error.
    pub fn circuit_breaker(message: impl Into<String>) -> Self {
        Self::CircuitBreaker(message.into())
    }

    /// Whether the error means no usable snapshot is stored.
    pub fn is_store_error(&self) -> bool {
        match self {
            Self::Store(_) => true,
            Self::Joined(inner) => inner.is_store_error(),
            _ => false,
        }
    }
}
