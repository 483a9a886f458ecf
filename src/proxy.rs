//! Proxy selection
//!
//! Routes URLs containing one of the configured domain substrings through
//! the configured proxy. The first matching domain wins.

use crate::config::{parse_domain_list, ClientConfig};
use crate::types::{keys, Options};
use tracing::debug;

/// Decides whether a URL goes through the proxy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxySelector {
    proxy_uri: Option<String>,
    domains: Vec<String>,
}

impl ProxySelector {
    /// Create a selector. Blank proxy URIs and domains are ignored.
    pub fn new(proxy_uri: Option<String>, domains: impl IntoIterator<Item = String>) -> Self {
        Self {
            proxy_uri: proxy_uri.filter(|p| !p.trim().is_empty()),
            domains: domains
                .into_iter()
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    /// Create a selector from a comma-separated domain list
    pub fn from_list(proxy_uri: Option<String>, domains: &str) -> Self {
        Self::new(proxy_uri, parse_domain_list(domains))
    }

    /// Create a selector from the client config
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.proxy_uri.clone(), config.proxy_domains.iter().cloned())
    }

    /// Whether any proxying is configured
    pub fn is_enabled(&self) -> bool {
        self.proxy_uri.is_some() && !self.domains.is_empty()
    }

    /// The first configured domain contained in `url`
    pub fn matches(&self, url: &str) -> Option<&str> {
        if self.proxy_uri.is_none() {
            return None;
        }
        self.domains
            .iter()
            .find(|domain| url.contains(domain.as_str()))
            .map(String::as_str)
    }

    /// Set the `proxy` option when `url` matches a configured domain
    pub fn apply(&self, url: &str, mut options: Options) -> Options {
        if let (Some(domain), Some(proxy)) = (self.matches(url), &self.proxy_uri) {
            debug!(url, domain, proxy = %proxy, "Adding proxy to request");
            options.insert(keys::PROXY, proxy.as_str());
        }
        options
    }
}
