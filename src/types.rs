//! Common types used throughout Solidafy HTTP
//!
//! This module contains shared type definitions, type aliases,
//! and the transport option map that flows through the decorator chain.

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use serde::ser::{Error as _, SerializeMap};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// Boxed stream of body chunks
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

// ============================================================================
// Option Keys
// ============================================================================

/// Well-known option keys understood by the transports and decorators
pub mod keys {
    /// Distributed lock key, consumed by the lock decorator
    pub const LOCK_KEY: &str = "lock_key";
    /// Response cache key, consumed by the cache decorator
    pub const CACHE_KEY: &str = "cache_key";
    /// Response cache TTL in seconds, consumed by the cache decorator
    pub const CACHE_TTL: &str = "cache_ttl";
    /// Proxy URI
    pub const PROXY: &str = "proxy";
    /// Request timeout in seconds
    pub const TIMEOUT: &str = "timeout";
    /// Host to IP pinning map
    pub const RESOLVE: &str = "resolve";
    /// Request headers (object of strings)
    pub const HEADERS: &str = "headers";
    /// Query parameters (object of scalars)
    pub const QUERY: &str = "query";
    /// JSON body
    pub const JSON: &str = "json";
    /// Raw or form body
    pub const BODY: &str = "body";
}

// ============================================================================
// Raw Handles
// ============================================================================

/// A one-shot body stream carried inside request options.
///
/// Handles are not serializable: the first transport to send the request
/// takes the stream, and any attempt to serialize the handle fails.
#[derive(Clone)]
pub struct RawHandle {
    kind: String,
    stream: Arc<Mutex<Option<ByteStream>>>,
}

impl RawHandle {
    /// Wrap a byte stream, labelled with the kind of resource it reads from
    pub fn new(kind: impl Into<String>, stream: ByteStream) -> Self {
        Self {
            kind: kind.into(),
            stream: Arc::new(Mutex::new(Some(stream))),
        }
    }

    /// Create a handle yielding a single buffered chunk
    pub fn from_bytes(kind: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self::new(kind, stream::once(async move { Ok(bytes) }).boxed())
    }

    /// The resource type label
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Take the underlying stream, leaving the handle consumed
    pub fn take(&self) -> Option<ByteStream> {
        self.stream.lock().ok().and_then(|mut guard| guard.take())
    }

    /// Whether the stream was already taken
    pub fn is_consumed(&self) -> bool {
        self.stream.lock().map(|guard| guard.is_none()).unwrap_or(true)
    }
}

impl fmt::Debug for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawHandle")
            .field("kind", &self.kind)
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

impl PartialEq for RawHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.stream, &other.stream)
    }
}

// ============================================================================
// Option Values
// ============================================================================

/// A single transport option value
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// Plain JSON data
    Json(JsonValue),
    /// Raw body handle
    Handle(RawHandle),
}

impl OptionValue {
    /// Borrow as JSON, if this is not a handle
    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            OptionValue::Json(v) => Some(v),
            OptionValue::Handle(_) => None,
        }
    }

    /// Borrow as string
    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(JsonValue::as_str)
    }

    /// Read as unsigned integer (accepts numeric strings)
    pub fn as_u64(&self) -> Option<u64> {
        match self.as_json()? {
            JsonValue::Number(n) => n.as_u64(),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Read as float (accepts numeric strings)
    pub fn as_f64(&self) -> Option<f64> {
        match self.as_json()? {
            JsonValue::Number(n) => n.as_f64(),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Whether this is a raw handle
    pub fn is_handle(&self) -> bool {
        matches!(self, OptionValue::Handle(_))
    }
}

impl Serialize for OptionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            OptionValue::Json(v) => v.serialize(serializer),
            OptionValue::Handle(h) => Err(S::Error::custom(format!(
                "cannot serialize raw {} handle",
                h.kind()
            ))),
        }
    }
}

impl From<JsonValue> for OptionValue {
    fn from(value: JsonValue) -> Self {
        OptionValue::Json(value)
    }
}

impl From<RawHandle> for OptionValue {
    fn from(handle: RawHandle) -> Self {
        OptionValue::Handle(handle)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Json(JsonValue::String(value.to_string()))
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Json(JsonValue::String(value))
    }
}

impl From<u64> for OptionValue {
    fn from(value: u64) -> Self {
        OptionValue::Json(value.into())
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Json(value.into())
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Json(value.into())
    }
}

// ============================================================================
// Options
// ============================================================================

/// Transport options for a single call, keyed by option name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options(BTreeMap<String, OptionValue>);

impl Options {
    /// Create an empty option map
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Get an option
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    /// Get an option as string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(OptionValue::as_str)
    }

    /// Get an option as JSON
    pub fn get_json(&self, key: &str) -> Option<&JsonValue> {
        self.get(key).and_then(OptionValue::as_json)
    }

    /// Insert an option, returning the previous value
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<OptionValue>,
    ) -> Option<OptionValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Remove an option
    pub fn remove(&mut self, key: &str) -> Option<OptionValue> {
        self.0.remove(key)
    }

    /// Check if an option is set
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of options
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no options are set
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over options
    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionValue)> {
        self.0.iter()
    }

    /// Fill in every option from `defaults` that is not already set
    pub fn merge_defaults(&mut self, defaults: &Options) {
        for (key, value) in defaults.iter() {
            self.0.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    /// Convert to a JSON object. Fails if any value is a raw handle.
    pub fn to_json(&self) -> serde_json::Result<JsonValue> {
        serde_json::to_value(self)
    }
}

impl Serialize for Options {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl From<JsonObject> for Options {
    fn from(object: JsonObject) -> Self {
        object
            .into_iter()
            .map(|(k, v)| (k, OptionValue::Json(v)))
            .collect()
    }
}

impl FromIterator<(String, OptionValue)> for Options {
    fn from_iter<I: IntoIterator<Item = (String, OptionValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Options {
    type Item = (String, OptionValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, OptionValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Backoff strategy type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay
    Constant,
    /// Linear increase
    Linear,
    /// Exponential increase
    #[default]
    Exponential,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_options_serialize_json_values() {
        let options = Options::new()
            .with(keys::TIMEOUT, 10u64)
            .with(keys::HEADERS, json!({"Accept": "application/json"}));

        let value = options.to_json().unwrap();
        assert_eq!(value["timeout"], 10);
        assert_eq!(value["headers"]["Accept"], "application/json");
    }

    #[test]
    fn test_options_with_handle_fail_to_serialize() {
        let options = Options::new().with(keys::BODY, RawHandle::from_bytes("stream", "abc"));

        let err = serde_json::to_string(&options).unwrap_err();
        assert!(err.to_string().contains("raw stream handle"));
    }

    #[test]
    fn test_option_value_numeric_strings() {
        let value = OptionValue::from("30");
        assert_eq!(value.as_u64(), Some(30));
        assert_eq!(value.as_f64(), Some(30.0));
        assert_eq!(OptionValue::from(json!([1])).as_u64(), None);
    }

    #[test]
    fn test_merge_defaults_keeps_existing() {
        let mut options = Options::new().with(keys::TIMEOUT, 5u64);
        let defaults = Options::new()
            .with(keys::TIMEOUT, 30u64)
            .with(keys::PROXY, "http://proxy:8080");

        options.merge_defaults(&defaults);

        assert_eq!(options.get(keys::TIMEOUT).and_then(OptionValue::as_u64), Some(5));
        assert_eq!(options.get_str(keys::PROXY), Some("http://proxy:8080"));
    }

    #[test]
    fn test_raw_handle_take_once() {
        let handle = RawHandle::from_bytes("stream", "payload");
        let copy = handle.clone();

        assert!(!handle.is_consumed());
        assert!(copy.take().is_some());
        assert!(handle.is_consumed());
        assert!(handle.take().is_none());
        assert_eq!(handle, copy);
    }
}
