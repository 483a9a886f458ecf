//! Logical requests
//!
//! A request describes what to call. Behavior such as retry, caching and
//! locking is opted into through capability traits, which the client runtime
//! discovers through the `as_*` accessors when it builds the transport chain.

use crate::error::Result;
use crate::logging::describe_error;
use crate::types::{JsonValue, Options};
use serde_json::json;

/// A request that can be sent through an [`ApiClient`](crate::client::ApiClient)
pub trait ApiRequest: Send + Sync {
    /// Path relative to the client's base URL, or an absolute URL
    fn request_path(&self) -> String;

    /// Transport options declared by the request
    fn request_options(&self) -> Result<Option<Options>>;

    /// Method override; the client default applies when `None` or empty
    fn request_method(&self) -> Option<String> {
        None
    }

    fn as_auto_retry(&self) -> Option<&dyn AutoRetry> {
        None
    }

    fn as_cacheable(&self) -> Option<&dyn Cacheable> {
        None
    }

    fn as_lockable(&self) -> Option<&dyn Lockable> {
        None
    }

    /// Type label used in diagnostics
    fn label(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Summary attached to error logs
    fn log_data(&self) -> JsonValue {
        let payload = match self.request_options() {
            Ok(Some(options)) => options.to_json().unwrap_or_else(|e| {
                JsonValue::String(format!("unserializable options: {e}"))
            }),
            Ok(None) => JsonValue::Null,
            Err(e) => JsonValue::String(describe_error(&e)),
        };
        json!({
            "class": self.label(),
            "path": self.request_path(),
            "method": self.request_method(),
            "payload": payload,
        })
    }
}

/// Retry transient failures, up to `max_retries` extra attempts
pub trait AutoRetry {
    fn max_retries(&self) -> u32;
}

/// Serve the response from the cache when possible
pub trait Cacheable {
    fn cache_key(&self) -> String;

    /// Seconds
    fn cache_ttl(&self) -> u64;
}

/// Serialize calls sharing the same lock key
pub trait Lockable {
    fn lock_key(&self) -> String;
}

/// Pass-through request with optional capabilities
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpClientRequest {
    path: String,
    method: Option<String>,
    options: Option<Options>,
    max_retries: Option<u32>,
    cache: Option<(String, u64)>,
    lock_key: Option<String>,
}

impl HttpClientRequest {
    /// Create a request for `path`
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = Some(options);
        self
    }

    /// Opt into retries
    #[must_use]
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Opt into response caching
    #[must_use]
    pub fn with_cache(mut self, key: impl Into<String>, ttl_seconds: u64) -> Self {
        self.cache = Some((key.into(), ttl_seconds));
        self
    }

    /// Opt into locking
    #[must_use]
    pub fn with_lock(mut self, key: impl Into<String>) -> Self {
        self.lock_key = Some(key.into());
        self
    }
}

impl ApiRequest for HttpClientRequest {
    fn request_path(&self) -> String {
        self.path.clone()
    }

    fn request_options(&self) -> Result<Option<Options>> {
        Ok(self.options.clone())
    }

    fn request_method(&self) -> Option<String> {
        self.method.clone()
    }

    fn as_auto_retry(&self) -> Option<&dyn AutoRetry> {
        self.max_retries.map(|_| self as &dyn AutoRetry)
    }

    fn as_cacheable(&self) -> Option<&dyn Cacheable> {
        self.cache.as_ref().map(|_| self as &dyn Cacheable)
    }

    fn as_lockable(&self) -> Option<&dyn Lockable> {
        self.lock_key.as_ref().map(|_| self as &dyn Lockable)
    }

    fn label(&self) -> &'static str {
        "HttpClientRequest"
    }
}

impl AutoRetry for HttpClientRequest {
    fn max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(0)
    }
}

impl Cacheable for HttpClientRequest {
    fn cache_key(&self) -> String {
        self.cache.as_ref().map(|(key, _)| key.clone()).unwrap_or_default()
    }

    fn cache_ttl(&self) -> u64 {
        self.cache.as_ref().map_or(0, |(_, ttl)| *ttl)
    }
}

impl Lockable for HttpClientRequest {
    fn lock_key(&self) -> String {
        self.lock_key.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::keys;

    #[test]
    fn test_plain_request_has_no_capabilities() {
        let request = HttpClientRequest::new("/items");
        assert!(request.as_auto_retry().is_none());
        assert!(request.as_cacheable().is_none());
        assert!(request.as_lockable().is_none());
        assert_eq!(request.request_method(), None);
    }

    #[test]
    fn test_capabilities_are_discoverable() {
        let request = HttpClientRequest::new("/orders")
            .with_retries(2)
            .with_cache("orders", 60)
            .with_lock("orders:42");

        assert_eq!(request.as_auto_retry().map(|r| r.max_retries()), Some(2));
        let cacheable = request.as_cacheable().unwrap();
        assert_eq!(cacheable.cache_key(), "orders");
        assert_eq!(cacheable.cache_ttl(), 60);
        assert_eq!(request.as_lockable().unwrap().lock_key(), "orders:42");
    }

    #[test]
    fn test_log_data() {
        let request = HttpClientRequest::new("/orders")
            .with_method("POST")
            .with_options(Options::new().with(keys::JSON, json!({"id": 1})));

        let data = request.log_data();
        assert_eq!(data["class"], "HttpClientRequest");
        assert_eq!(data["path"], "/orders");
        assert_eq!(data["method"], "POST");
        assert_eq!(data["payload"]["json"]["id"], 1);
    }
}
