//! Lock decorator
//!
//! Serializes calls that carry the same `lock_key`. The key is stripped
//! before forwarding, the lock is acquired in blocking mode, and it is
//! released after the inner call on every path. A failed release is logged
//! and never replaces the inner call's outcome.

use super::factory::LockFactory;
use crate::error::{Error, Result};
use crate::transport::{Response, Transport};
use crate::types::{keys, ByteStream, JsonValue, OptionValue, Options};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Key used when the lock option is not a string
const FALLBACK_LOCK_KEY: &str = "default";

/// Decorator holding a named lock around the inner call
pub struct LockTransport {
    inner: Arc<dyn Transport>,
    locks: Arc<dyn LockFactory>,
}

impl LockTransport {
    /// Wrap `inner`
    pub fn new(inner: Arc<dyn Transport>, locks: Arc<dyn LockFactory>) -> Self {
        Self { inner, locks }
    }
}

/// Interpret the `lock_key` option. JSON null counts as absent.
fn lock_key_from(value: Option<OptionValue>) -> Option<String> {
    match value? {
        OptionValue::Json(JsonValue::Null) => None,
        OptionValue::Json(JsonValue::String(key)) => Some(key),
        OptionValue::Json(JsonValue::Number(n)) => Some(n.to_string()),
        _ => Some(FALLBACK_LOCK_KEY.to_string()),
    }
}

#[async_trait]
impl Transport for LockTransport {
    async fn request(&self, method: &str, url: &str, mut options: Options) -> Result<Response> {
        let lock_key = lock_key_from(options.remove(keys::LOCK_KEY));

        debug!(
            method,
            url,
            lock_key = lock_key.as_deref(),
            has_lock = lock_key.is_some(),
            "LockTransport request started"
        );

        let Some(lock_key) = lock_key else {
            let response = self.inner.request(method, url, options).await?;
            debug!(method, url, "LockTransport request completed (no lock)");
            return Ok(response);
        };

        let start = Instant::now();
        let mut lock = self.locks.create_lock(&lock_key);
        info!(method, url, lock_key = %lock_key, "LockTransport attempting to acquire lock");

        match lock.acquire(true).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(method, url, lock_key = %lock_key, "LockTransport failed to acquire lock");
                return Err(Error::lock_timeout(lock_key));
            }
            Err(e) => {
                warn!(
                    method,
                    url,
                    lock_key = %lock_key,
                    error = %e,
                    "LockTransport failed to acquire lock"
                );
                return Err(Error::lock_timeout(lock_key));
            }
        }

        info!(
            method,
            url,
            lock_key = %lock_key,
            acquire_duration = start.elapsed().as_secs_f64(),
            "LockTransport lock acquired"
        );

        let request_start = Instant::now();
        let result = self.inner.request(method, url, options).await;
        debug!(
            method,
            url,
            lock_key = %lock_key,
            duration = request_start.elapsed().as_secs_f64(),
            success = result.is_ok(),
            "LockTransport request completed with lock"
        );

        let release_start = Instant::now();
        match lock.release().await {
            Ok(()) => debug!(
                method,
                url,
                lock_key = %lock_key,
                release_duration = release_start.elapsed().as_secs_f64(),
                "LockTransport lock released"
            ),
            Err(e) => error!(
                method,
                url,
                lock_key = %lock_key,
                error = %e,
                "LockTransport failed to release lock"
            ),
        }

        result
    }

    fn stream(&self, response: Response) -> ByteStream {
        self.inner.stream(response)
    }

    fn with_options(&self, options: Options) -> Arc<dyn Transport> {
        Arc::new(Self {
            inner: self.inner.with_options(options),
            locks: Arc::clone(&self.locks),
        })
    }
}
