//! Tests for the DNS module

use super::*;
use crate::cache::{CacheStore, MemoryCacheStore};
use crate::config::ClientConfig;
use crate::error::Error;
use async_trait::async_trait;
use futures::FutureExt;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Resolver answering from a fixed table and counting lookups
#[derive(Default)]
struct TableResolver {
    table: HashMap<String, Ipv4Addr>,
    lookups: AtomicUsize,
}

impl TableResolver {
    fn with(host: &str, ip: Ipv4Addr) -> Self {
        Self {
            table: HashMap::from([(host.to_string(), ip)]),
            lookups: AtomicUsize::new(0),
        }
    }

    fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resolver for TableResolver {
    async fn lookup_ipv4(&self, host: &str) -> Option<Ipv4Addr> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.table.get(host).copied()
    }
}

fn dns_cache(
    resolver: Arc<TableResolver>,
    config: ClientConfig,
) -> (DnsCache, Arc<MemoryCacheStore>) {
    let store = Arc::new(MemoryCacheStore::new());
    let cache = DnsCache::new(store.clone(), resolver, Arc::new(config));
    (cache, store)
}

const API_IP: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 10);

#[test]
fn test_cache_key() {
    assert_eq!(DnsCache::cache_key("api.test"), "resolve:api.test");
}

#[tokio::test]
async fn test_resolve_caches_answer() {
    let resolver = Arc::new(TableResolver::with("api.test", API_IP));
    let (cache, store) = dns_cache(resolver.clone(), ClientConfig::default());

    assert_eq!(cache.resolve("api.test").await, "192.0.2.10");
    assert_eq!(cache.resolve("api.test").await, "192.0.2.10");

    assert_eq!(resolver.lookups(), 1);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_ip_literal_skips_resolver() {
    let resolver = Arc::new(TableResolver::default());
    let (cache, _) = dns_cache(resolver.clone(), ClientConfig::default());

    assert_eq!(cache.resolve("10.0.0.7").await, "10.0.0.7");
    assert_eq!(resolver.lookups(), 0);
}

#[tokio::test]
async fn test_failure_returns_host_and_is_cached() {
    let resolver = Arc::new(TableResolver::default());
    let (cache, _) = dns_cache(resolver.clone(), ClientConfig::default());

    assert_eq!(cache.resolve("nowhere.test").await, "nowhere.test");
    assert_eq!(cache.resolve("nowhere.test").await, "nowhere.test");
    assert_eq!(resolver.lookups(), 1);
}

#[tokio::test]
async fn test_refresh_forces_new_lookup() {
    let resolver = Arc::new(TableResolver::with("api.test", API_IP));
    let (cache, _) = dns_cache(resolver.clone(), ClientConfig::default());

    cache.resolve("api.test").await;
    assert_eq!(cache.refresh("api.test").await, "192.0.2.10");
    assert_eq!(resolver.lookups(), 2);
}

#[tokio::test]
async fn test_per_host_ttl_override() {
    let resolver = Arc::new(TableResolver::with("short.test", API_IP));
    let config = ClientConfig {
        dns_cache_ttl_overrides: HashMap::from([("short.test".to_string(), 0)]),
        ..ClientConfig::default()
    };
    let (cache, _) = dns_cache(resolver.clone(), config);

    cache.resolve("short.test").await;
    cache.resolve("short.test").await;

    assert_eq!(resolver.lookups(), 2);
}

#[tokio::test]
async fn test_malformed_entry_falls_back_to_host() {
    let resolver = Arc::new(TableResolver::with("api.test", API_IP));
    let (cache, store) = dns_cache(resolver.clone(), ClientConfig::default());

    store
        .get(
            &DnsCache::cache_key("api.test"),
            Duration::from_secs(60),
            Box::new(|| async { Ok::<_, Error>(serde_json::json!(42)) }.boxed()),
        )
        .await
        .unwrap();

    assert_eq!(cache.resolve("api.test").await, "api.test");
    assert_eq!(resolver.lookups(), 0);
}
