//! Client configuration
//!
//! `ClientConfig` is injected into the client runtime at construction time.
//! It can be loaded from YAML and overlaid with process environment
//! variables using the same names the services have always exported.

use crate::error::{Error, Result};
use crate::types::BackoffType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

// ============================================================================
// Environment Variable Names
// ============================================================================

const ENV_TIMEOUT: &str = "HTTP_REQUEST_TIMEOUT";
const ENV_ERROR_TIMEOUT: &str = "HTTP_REQUEST_ERROR_TIMEOUT";
const ENV_PROXY: &str = "HTTP_REQUEST_PROXY";
const ENV_PROXY_DOMAINS: &str = "HTTP_REQUEST_PROXY_DOMAINS";
const ENV_DNS_CACHE_TIME: &str = "API_CLIENT_DNS_RESOLVE_CACHE_TIME";
const ENV_DNS_HOST_PREFIX: &str = "API_CLIENT_DNS_RESOLVE_";
const ENV_DNS_HOST_SUFFIX: &str = "_CACHE_TIME";
const ENV_INTERNAL_DNS: &str = "API_CLIENT_INTERNAL_DNS_RESOLVE";
const ENV_DOMAIN_PREFIX: &str = "API_CLIENT_DOMAIN_";
const ENV_DOMAIN_SUFFIX: &str = "_DNS_RESOLVE";

// ============================================================================
// Client Config
// ============================================================================

/// Configuration shared by every request issued through a client runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Timeout applied when a request does not set one
    #[serde(default = "default_timeout_seconds")]
    pub default_timeout_seconds: u64,

    /// Requests slower than this are logged at error level
    #[serde(default = "default_slow_request_threshold_millis")]
    pub slow_request_threshold_millis: u64,

    /// Proxy used for matching domains
    #[serde(default)]
    pub proxy_uri: Option<String>,

    /// URL substrings routed through the proxy (first match wins)
    #[serde(default)]
    pub proxy_domains: Vec<String>,

    /// Global DNS resolution cache TTL
    #[serde(default = "default_dns_cache_ttl_seconds")]
    pub dns_cache_ttl_seconds: u64,

    /// Per-host DNS cache TTL overrides
    #[serde(default)]
    pub dns_cache_ttl_overrides: HashMap<String, u64>,

    /// Resolve hostnames through the DNS cache and pin them on the transport
    #[serde(default)]
    pub internal_dns_resolve: bool,

    /// Fixed host to IP pins, always applied
    #[serde(default)]
    pub dns_overrides: HashMap<String, String>,

    /// Enable read-through response caching for cacheable requests
    #[serde(default)]
    pub response_cache_enabled: bool,

    /// Retry backoff settings
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_slow_request_threshold_millis() -> u64 {
    5000
}

fn default_dns_cache_ttl_seconds() -> u64 {
    3600
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_timeout_seconds: default_timeout_seconds(),
            slow_request_threshold_millis: default_slow_request_threshold_millis(),
            proxy_uri: None,
            proxy_domains: Vec::new(),
            dns_cache_ttl_seconds: default_dns_cache_ttl_seconds(),
            dns_cache_ttl_overrides: HashMap::new(),
            internal_dns_resolve: false,
            dns_overrides: HashMap::new(),
            response_cache_enabled: false,
            retry: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Parse config from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&contents)
    }

    /// Defaults overlaid with the current process environment
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(std::env::vars());
        config
    }

    /// Overlay values from environment-style `(name, value)` pairs.
    ///
    /// Unparseable numeric values are ignored with a warning.
    pub fn apply_env<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in vars {
            let name = name.as_ref();
            let value = value.as_ref().trim();

            match name {
                ENV_TIMEOUT => set_numeric(name, value, &mut self.default_timeout_seconds),
                ENV_ERROR_TIMEOUT => {
                    set_numeric(name, value, &mut self.slow_request_threshold_millis);
                }
                ENV_PROXY => {
                    self.proxy_uri = (!value.is_empty()).then(|| value.to_string());
                }
                ENV_PROXY_DOMAINS => self.proxy_domains = parse_domain_list(value),
                ENV_DNS_CACHE_TIME => set_numeric(name, value, &mut self.dns_cache_ttl_seconds),
                ENV_INTERNAL_DNS => self.internal_dns_resolve = !value.is_empty(),
                _ => self.apply_host_env(name, value),
            }
        }
    }

    fn apply_host_env(&mut self, name: &str, value: &str) {
        if let Some(host) = name
            .strip_prefix(ENV_DNS_HOST_PREFIX)
            .and_then(|rest| rest.strip_suffix(ENV_DNS_HOST_SUFFIX))
            .filter(|host| !host.is_empty())
        {
            match value.parse() {
                Ok(ttl) => {
                    self.dns_cache_ttl_overrides.insert(host.to_string(), ttl);
                }
                Err(_) => warn!(variable = name, value, "Ignoring non-numeric DNS cache TTL"),
            }
            return;
        }

        if let Some(host) = name
            .strip_prefix(ENV_DOMAIN_PREFIX)
            .and_then(|rest| rest.strip_suffix(ENV_DOMAIN_SUFFIX))
            .filter(|host| !host.is_empty())
        {
            if !value.is_empty() {
                self.dns_overrides
                    .insert(host.to_string(), value.to_string());
            }
        }
    }

    /// Check values that cannot be validated by deserialization alone
    pub fn validate(&self) -> Result<()> {
        if let Some(proxy) = &self.proxy_uri {
            url::Url::parse(proxy)
                .map_err(|e| Error::invalid_config("proxy_uri", e.to_string()))?;
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(Error::invalid_config(
                "retry.initial_backoff_ms",
                "must not exceed retry.max_backoff_ms",
            ));
        }
        Ok(())
    }

    /// Default request timeout
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_seconds)
    }

    /// DNS cache TTL for a host, honoring per-host overrides
    pub fn dns_ttl_for(&self, host: &str) -> Duration {
        let seconds = self
            .dns_cache_ttl_overrides
            .get(host)
            .copied()
            .unwrap_or(self.dns_cache_ttl_seconds);
        Duration::from_secs(seconds)
    }
}

fn set_numeric(name: &str, value: &str, target: &mut u64) {
    match value.parse() {
        Ok(parsed) => *target = parsed,
        Err(_) => warn!(variable = name, value, "Ignoring non-numeric value"),
    }
}

/// Split a comma-separated domain list, dropping blank entries
pub fn parse_domain_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(String::from)
        .collect()
}

// ============================================================================
// Retry Config
// ============================================================================

/// Backoff settings for the retry decorator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Backoff curve
    #[serde(default)]
    pub backoff_type: BackoffType,

    /// Delay before the first retry
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound for any single delay
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Response statuses that trigger a retry
    #[serde(default = "default_retry_statuses")]
    pub retry_statuses: Vec<u16>,
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_retry_statuses() -> Vec<u16> {
    vec![423, 425, 429, 500, 502, 503, 504, 507, 510]
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff_type: BackoffType::default(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            retry_statuses: default_retry_statuses(),
        }
    }
}

impl RetryConfig {
    /// Delay before the first retry
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// Upper bound for any single delay
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}
