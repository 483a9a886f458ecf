//! Response cache decorator

use super::store::CacheStore;
use crate::error::{Error, Result};
use crate::transport::{CachedResponse, Response, Transport};
use crate::types::{keys, ByteStream, OptionValue, Options};
use async_trait::async_trait;
use futures::FutureExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// TTL used when a cache key is given without `cache_ttl`
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Store key for a caller-supplied response cache key. Responses live in
/// their own namespace so they never collide with other users of the store.
pub fn response_cache_key(key: &str) -> String {
    format!("response:{key}")
}

/// How the cache decorator treats requests carrying a cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Caching disabled: forward every request
    #[default]
    PassThrough,
    /// Serve stored snapshots, buffer and store on miss
    ReadThrough,
}

/// Decorator short-circuiting requests that have a cached response
pub struct CacheTransport {
    inner: Arc<dyn Transport>,
    store: Arc<dyn CacheStore>,
    mode: CacheMode,
}

impl CacheTransport {
    /// Wrap `inner`
    pub fn new(inner: Arc<dyn Transport>, store: Arc<dyn CacheStore>, mode: CacheMode) -> Self {
        Self { inner, store, mode }
    }

    /// The active mode
    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    async fn read_through(
        &self,
        key: &str,
        ttl: u64,
        method: &str,
        url: &str,
        options: Options,
    ) -> Result<Response> {
        let inner = Arc::clone(&self.inner);
        let missed = Arc::new(AtomicBool::new(false));
        let missed_flag = Arc::clone(&missed);
        let (owned_method, owned_url) = (method.to_string(), url.to_string());

        let value = self
            .store
            .get(
                &response_cache_key(key),
                Duration::from_secs(ttl),
                Box::new(move || {
                    async move {
                        missed_flag.store(true, Ordering::SeqCst);
                        let response = inner.request(&owned_method, &owned_url, options).await?;
                        let snapshot = response.into_cached().await?;
                        Ok::<_, Error>(serde_json::to_value(&snapshot)?)
                    }
                    .boxed()
                }),
            )
            .await?;

        debug!(
            method,
            url,
            cache_key = key,
            hit = !missed.load(Ordering::SeqCst),
            "CacheTransport served response"
        );

        let snapshot: CachedResponse = serde_json::from_value(value)?;
        Response::from_cached(snapshot)
    }
}

#[async_trait]
impl Transport for CacheTransport {
    async fn request(&self, method: &str, url: &str, mut options: Options) -> Result<Response> {
        let cache_key = options
            .remove(keys::CACHE_KEY)
            .as_ref()
            .and_then(OptionValue::as_str)
            .filter(|k| !k.is_empty())
            .map(String::from);
        let cache_ttl = options
            .remove(keys::CACHE_TTL)
            .as_ref()
            .and_then(OptionValue::as_u64)
            .unwrap_or(DEFAULT_CACHE_TTL_SECS);

        let Some(cache_key) = cache_key else {
            let start = Instant::now();
            let response = self.inner.request(method, url, options).await?;
            debug!(
                method,
                url,
                duration = start.elapsed().as_secs_f64(),
                "CacheTransport request completed (no cache)"
            );
            return Ok(response);
        };

        match self.mode {
            CacheMode::PassThrough => {
                warn!(
                    method,
                    url,
                    cache_key = %cache_key,
                    "Response cache is disabled, forwarding request"
                );
                self.inner.request(method, url, options).await
            }
            CacheMode::ReadThrough => {
                self.read_through(&cache_key, cache_ttl, method, url, options)
                    .await
            }
        }
    }

    fn stream(&self, response: Response) -> ByteStream {
        self.inner.stream(response)
    }

    fn with_options(&self, options: Options) -> Arc<dyn Transport> {
        Arc::new(Self {
            inner: self.inner.with_options(options),
            store: Arc::clone(&self.store),
            mode: self.mode,
        })
    }
}
