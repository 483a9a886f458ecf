//! Resolver implementations and the caching front

use crate::cache::CacheStore;
use crate::config::ClientConfig;
use crate::error::Error;
use crate::types::JsonValue;
use async_trait::async_trait;
use futures::FutureExt;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tracing::{debug, warn};

/// Hostname lookup backend
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve `host` to an IPv4 address, `None` on failure
    async fn lookup_ipv4(&self, host: &str) -> Option<Ipv4Addr>;
}

/// Resolver backed by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn lookup_ipv4(&self, host: &str) -> Option<Ipv4Addr> {
        match tokio::net::lookup_host((host, 0)).await {
            Ok(addrs) => addrs
                .map(|addr| addr.ip())
                .find_map(|ip| match ip {
                    IpAddr::V4(v4) => Some(v4),
                    IpAddr::V6(_) => None,
                }),
            Err(e) => {
                debug!(host, error = %e, "Host lookup failed");
                None
            }
        }
    }
}

/// Caching front for a [`Resolver`]
pub struct DnsCache {
    store: Arc<dyn CacheStore>,
    resolver: Arc<dyn Resolver>,
    config: Arc<ClientConfig>,
}

impl DnsCache {
    /// Create a cache over `store`, resolving misses with `resolver`
    pub fn new(
        store: Arc<dyn CacheStore>,
        resolver: Arc<dyn Resolver>,
        config: Arc<ClientConfig>,
    ) -> Self {
        Self {
            store,
            resolver,
            config,
        }
    }

    /// Cache key for a host
    pub fn cache_key(host: &str) -> String {
        format!("resolve:{host}")
    }

    /// Drop the cached answer for `host` and resolve it again
    pub async fn refresh(&self, host: &str) -> String {
        self.store.invalidate(&Self::cache_key(host)).await;
        self.resolve(host).await
    }

    /// Resolve `host`, returning the host itself when resolution fails
    pub async fn resolve(&self, host: &str) -> String {
        let ttl = self.config.dns_ttl_for(host);
        let resolver = Arc::clone(&self.resolver);
        let owned_host = host.to_string();

        let result = self
            .store
            .get(
                &Self::cache_key(host),
                ttl,
                Box::new(move || {
                    async move {
                        if owned_host.parse::<Ipv4Addr>().is_ok() {
                            return Ok::<_, Error>(JsonValue::String(owned_host));
                        }
                        let ip = match resolver.lookup_ipv4(&owned_host).await {
                            Some(ip) => ip.to_string(),
                            None => {
                                warn!(host = %owned_host, "DNS resolution failed");
                                owned_host
                            }
                        };
                        Ok(JsonValue::String(ip))
                    }
                    .boxed()
                }),
            )
            .await;

        match result {
            Ok(JsonValue::String(ip)) => ip,
            Ok(other) => {
                warn!(host, cached = %other, "Ignoring malformed DNS cache entry");
                host.to_string()
            }
            Err(e) => {
                warn!(host, error = %e, "DNS cache lookup failed");
                host.to_string()
            }
        }
    }
}

impl std::fmt::Debug for DnsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsCache")
            .field("default_ttl_seconds", &self.config.dns_cache_ttl_seconds)
            .finish_non_exhaustive()
    }
}
