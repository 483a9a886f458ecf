//! Client types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of a client health check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum HealthStatus {
    /// The upstream host resolves
    Success(String),
    /// The upstream host is unusable
    Failure(String),
    /// Nothing to check
    Skip(String),
}

impl HealthStatus {
    /// Create a success result
    pub fn success(message: impl Into<String>) -> Self {
        Self::Success(message.into())
    }

    /// Create a failure result
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }

    /// Create a skip result
    pub fn skip(message: impl Into<String>) -> Self {
        Self::Skip(message.into())
    }

    /// Whether the check passed
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The message attached to the result
    pub fn message(&self) -> &str {
        match self {
            Self::Success(m) | Self::Failure(m) | Self::Skip(m) => m,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            Self::Success(_) => "success",
            Self::Failure(_) => "failure",
            Self::Skip(_) => "skip",
        };
        write!(f, "{status}: {}", self.message())
    }
}

/// Join a request path onto a base URL. Absolute `http(s)://` paths are
/// returned unchanged; `None` means a relative path with no base URL.
pub fn join_url(base_url: &str, path: &str) -> Option<String> {
    if path.starts_with("http://") || path.starts_with("https://") {
        return Some(path.to_string());
    }
    if base_url.is_empty() {
        return None;
    }

    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        Some(base.to_string())
    } else {
        Some(format!("{base}/{path}"))
    }
}
