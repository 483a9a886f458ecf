//! Transport responses
//!
//! A `Response` exposes status and headers as soon as the transport returns,
//! while the body stays on the wire until someone reads it. Decorators and
//! the executor must only look at status/headers so an enclosing reader never
//! finds its body already drained.

use crate::error::{Error, Result};
use crate::types::{ByteStream, JsonValue};
use base64::Engine as _;
use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;

enum Body {
    Live(reqwest::Response),
    Buffered(Bytes),
}

/// Response returned by a [`Transport`](super::Transport)
pub struct Response {
    status: Option<u16>,
    headers: HeaderMap,
    url: String,
    body: Body,
}

impl Response {
    /// Wrap a live reqwest response without touching its body
    pub fn from_reqwest(response: reqwest::Response) -> Self {
        Self {
            status: Some(response.status().as_u16()),
            headers: response.headers().clone(),
            url: response.url().to_string(),
            body: Body::Live(response),
        }
    }

    /// Create a response with an in-memory body
    pub fn buffered(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status: Some(status),
            headers: HeaderMap::new(),
            url: String::new(),
            body: Body::Buffered(body.into()),
        }
    }

    /// Create a buffered response whose status is unknown
    pub fn without_status(body: impl Into<Bytes>) -> Self {
        Self {
            status: None,
            ..Self::buffered(0, body)
        }
    }

    /// Add a header. Invalid names or values are ignored.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Set the URL the response was fetched from
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// HTTP status, if the transport reported one
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// HTTP status, or 0 when unknown. Never reads the body.
    pub fn status_code(&self) -> u16 {
        self.status.unwrap_or(0)
    }

    /// Response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a header value as string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Final URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the body is already in memory
    pub fn is_buffered(&self) -> bool {
        matches!(self.body, Body::Buffered(_))
    }

    /// Buffered body content, if already in memory
    pub fn buffered_body(&self) -> Option<&Bytes> {
        match &self.body {
            Body::Buffered(bytes) => Some(bytes),
            Body::Live(_) => None,
        }
    }

    /// Transfer metadata, available without reading the body
    pub fn info(&self) -> JsonValue {
        json!({
            "http_code": self.status_code(),
            "url": self.url,
            "buffered": self.is_buffered(),
        })
    }

    /// Read the whole body
    pub async fn bytes(self) -> Result<Bytes> {
        match self.body {
            Body::Live(response) => Ok(response.bytes().await?),
            Body::Buffered(bytes) => Ok(bytes),
        }
    }

    /// Read the body as UTF-8 text (lossy)
    pub async fn text(self) -> Result<String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read the body as JSON
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Read the body into memory, keeping status and headers
    pub async fn buffer(self) -> Result<Response> {
        let status = self.status;
        let headers = self.headers.clone();
        let url = self.url.clone();
        let body = self.bytes().await?;
        Ok(Self {
            status,
            headers,
            url,
            body: Body::Buffered(body),
        })
    }

    /// Body as a stream of chunks
    pub fn into_stream(self) -> ByteStream {
        match self.body {
            Body::Live(response) => response
                .bytes_stream()
                .map_err(std::io::Error::other)
                .boxed(),
            Body::Buffered(bytes) => stream::once(async move { Ok(bytes) }).boxed(),
        }
    }

    /// Read the body and snapshot the full response
    pub async fn into_cached(self) -> Result<CachedResponse> {
        let status_code = self.status_code();
        let info = self.info();
        let headers = headers_to_map(&self.headers);
        let body = self.bytes().await?;
        Ok(CachedResponse {
            status_code,
            headers,
            body: base64::engine::general_purpose::STANDARD.encode(&body),
            info,
        })
    }

    /// Rebuild a buffered response from a snapshot
    pub fn from_cached(cached: CachedResponse) -> Result<Self> {
        let body = cached.content()?;
        let url = cached.info["url"].as_str().unwrap_or_default().to_string();
        let mut response = Self::buffered(cached.status_code, body).with_url(url);
        for (name, values) in &cached.headers {
            for value in values {
                response = response.with_header(name, value);
            }
        }
        Ok(response)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("url", &self.url)
            .field("buffered", &self.is_buffered())
            .finish_non_exhaustive()
    }
}

fn headers_to_map(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            map.entry(name.as_str().to_string())
                .or_default()
                .push(value.to_string());
        }
    }
    map
}

/// Immutable snapshot of a completed response, as stored in the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    /// HTTP status
    pub status_code: u16,
    /// Header values by lowercase name
    pub headers: BTreeMap<String, Vec<String>>,
    /// Base64-encoded body
    pub body: String,
    /// Transfer metadata captured with the response
    pub info: JsonValue,
}

impl CachedResponse {
    /// Decoded body content
    pub fn content(&self) -> Result<Bytes> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.body)
            .map(Bytes::from)
            .map_err(|e| Error::cache(format!("corrupt cached body: {e}")))
    }
}
