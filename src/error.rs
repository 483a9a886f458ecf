//! Error types for Solidafy HTTP
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Transport and lock errors are surfaced to callers unchanged. Serialization
//! and persistence errors are produced by the request logger and always
//! recovered locally, they never reach the caller of a request.

use thiserror::Error;

/// The main error type for Solidafy HTTP
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Missing base URL for client '{client}'")]
    MissingBaseUrl { client: String },

    // ============================================================================
    // Transport Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid request option '{key}': {message}")]
    InvalidOption { key: String, message: String },

    #[error("Request body stream '{kind}' was already consumed")]
    BodyConsumed { kind: String },

    // ============================================================================
    // Lock Errors
    // ============================================================================
    #[error("Failed to acquire lock '{key}', please retry later")]
    LockTimeout { key: String },

    #[error("Lock error: {message}")]
    Lock { message: String },

    // ============================================================================
    // Cache Errors
    // ============================================================================
    #[error("Cache error: {message}")]
    Cache { message: String },

    // ============================================================================
    // Logging Errors
    // ============================================================================
    #[error("Serialization failed: {message}")]
    Serialization { message: String },

    #[error("Failed to persist request log: {message}")]
    Persistence { message: String },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create an invalid option error
    pub fn invalid_option(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a lock timeout error
    pub fn lock_timeout(key: impl Into<String>) -> Self {
        Self::LockTimeout { key: key.into() }
    }

    /// Create a lock error
    pub fn lock(message: impl Into<String>) -> Self {
        Self::Lock {
            message: message.into(),
        }
    }

    /// Create a cache error
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            Error::Timeout { .. } => true,
            Error::HttpStatus { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    /// Short name of the error kind, used in log records
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config { .. }
            | Error::InvalidConfigValue { .. }
            | Error::YamlParse(_)
            | Error::MissingBaseUrl { .. } => "ConfigError",
            Error::Http(_)
            | Error::HttpStatus { .. }
            | Error::Timeout { .. }
            | Error::InvalidUrl(_)
            | Error::InvalidOption { .. }
            | Error::BodyConsumed { .. } => "TransportError",
            Error::LockTimeout { .. } => "LockTimeoutError",
            Error::Lock { .. } => "LockError",
            Error::Cache { .. } => "CacheError",
            Error::Serialization { .. } | Error::JsonParse(_) => "SerializationError",
            Error::Persistence { .. } => "PersistenceError",
            Error::Io(_) => "IoError",
            Error::Other(_) | Error::Anyhow(_) => "Error",
        }
    }
}

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Result type alias for Solidafy HTTP
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
