//! Cache stores
//!
//! Stores hold JSON values under string keys with a TTL and compute missing
//! values on demand.

use crate::error::Result;
use crate::types::JsonValue;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::trace;

/// Deferred computation of a missing cache value
pub type Compute<'a> = Box<dyn FnOnce() -> BoxFuture<'a, Result<JsonValue>> + Send + 'a>;

/// Shared keyed store with compute-on-miss semantics
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Return the value stored under `key`, or run `compute`, store its
    /// result for `ttl` and return it. Failed computations are not stored.
    async fn get(&self, key: &str, ttl: Duration, compute: Compute<'_>) -> Result<JsonValue>;

    /// Drop a stored value
    async fn invalidate(&self, key: &str);
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: JsonValue,
    expires_at: Instant,
}

/// In-process TTL store.
///
/// Concurrent misses on one key are collapsed: the first caller computes,
/// the others wait for it and read the stored value.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
    flights: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MemoryCacheStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    /// Whether the store holds no live entries
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove every entry
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    async fn live(&self, key: &str) -> Option<JsonValue> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone())
    }

    async fn join_flight(&self, key: &str) -> Arc<Mutex<()>> {
        let mut flights = self.flights.lock().await;
        Arc::clone(flights.entry(key.to_string()).or_default())
    }

    /// Forget the flight gate once nobody else waits on it
    async fn leave_flight(&self, key: &str, gate: &Arc<Mutex<()>>) {
        let mut flights = self.flights.lock().await;
        // one reference in the map, one held by the caller
        if Arc::strong_count(gate) <= 2 {
            flights.remove(key);
        }
    }

    async fn compute_and_store(
        &self,
        key: &str,
        ttl: Duration,
        compute: Compute<'_>,
    ) -> Result<JsonValue> {
        if let Some(value) = self.live(key).await {
            trace!(key, "Cache filled by concurrent caller");
            return Ok(value);
        }

        trace!(key, "Cache miss");
        let value = compute().await?;

        if !ttl.is_zero() {
            let mut entries = self.entries.write().await;
            entries.retain(|_, e| e.expires_at > Instant::now());
            entries.insert(
                key.to_string(),
                CacheEntry {
                    value: value.clone(),
                    expires_at: Instant::now() + ttl,
                },
            );
        }

        Ok(value)
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str, ttl: Duration, compute: Compute<'_>) -> Result<JsonValue> {
        if let Some(value) = self.live(key).await {
            trace!(key, "Cache hit");
            return Ok(value);
        }

        let gate = self.join_flight(key).await;
        let result = {
            let _flight = gate.lock().await;
            self.compute_and_store(key, ttl, compute).await
        };
        self.leave_flight(key, &gate).await;
        result
    }

    async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}
