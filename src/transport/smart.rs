//! Smart base transport
//!
//! Executes option maps on reqwest. Proxy and host pinning are client-level
//! settings in reqwest, so one client is built and cached per distinct
//! proxy/pin profile. At most [`MAX_CLIENT_PROFILES`] such clients are kept;
//! the oldest one is dropped to make room. Hostnames can be pinned through
//! the DNS resolution cache, and fixed per-host overrides always win.

use super::{Response, Transport};
use crate::config::ClientConfig;
use crate::dns::DnsCache;
use crate::error::{Error, Result};
use crate::types::{keys, JsonObject, JsonValue, OptionValue, Options};
use async_trait::async_trait;
use reqwest::{Client, Method, Proxy, RequestBuilder};
use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, trace};

/// Upper bound on cached per-profile reqwest clients
pub const MAX_CLIENT_PROFILES: usize = 32;

/// Client-level settings that require a dedicated reqwest client
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
struct ClientProfile {
    proxy: Option<String>,
    pins: Vec<(String, String)>,
}

impl ClientProfile {
    fn from_options(options: &Options) -> Result<Self> {
        let proxy = options
            .get_str(keys::PROXY)
            .filter(|p| !p.is_empty())
            .map(String::from);

        let pins = match options.get(keys::RESOLVE) {
            None => Vec::new(),
            Some(OptionValue::Json(JsonValue::Object(map))) => map
                .iter()
                .map(|(host, ip)| (host.clone(), scalar_to_string(ip)))
                .collect(),
            Some(_) => {
                return Err(Error::invalid_option(
                    keys::RESOLVE,
                    "expected an object of host to IP",
                ))
            }
        };

        Ok(Self { proxy, pins })
    }

    fn is_default(&self) -> bool {
        self.proxy.is_none() && self.pins.is_empty()
    }
}

/// Per-profile clients, evicted oldest first
#[derive(Default)]
struct ProfileClients {
    clients: HashMap<ClientProfile, Client>,
    order: VecDeque<ClientProfile>,
}

impl ProfileClients {
    fn get(&self, profile: &ClientProfile) -> Option<Client> {
        self.clients.get(profile).cloned()
    }

    fn insert(&mut self, profile: ClientProfile, client: Client) {
        while self.clients.len() >= MAX_CLIENT_PROFILES {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            trace!(proxy = ?oldest.proxy, pins = oldest.pins.len(), "Evicting reqwest client");
            self.clients.remove(&oldest);
        }
        self.order.push_back(profile.clone());
        self.clients.insert(profile, client);
    }
}

/// The base transport used by client runtimes
#[derive(Clone)]
pub struct SmartTransport {
    base: Client,
    config: Arc<ClientConfig>,
    dns: Option<Arc<DnsCache>>,
    defaults: Options,
    profiles: Arc<RwLock<ProfileClients>>,
    user_agent: String,
}

impl SmartTransport {
    /// Create a transport with the given config
    pub fn new(config: Arc<ClientConfig>) -> Result<Self> {
        let user_agent = format!("solidafy-http/{}", env!("CARGO_PKG_VERSION"));
        let base = Client::builder().user_agent(&user_agent).build()?;

        Ok(Self {
            base,
            config,
            dns: None,
            defaults: Options::new(),
            profiles: Arc::new(RwLock::new(ProfileClients::default())),
            user_agent,
        })
    }

    /// Resolve hosts through this DNS cache when internal resolution is enabled
    #[must_use]
    pub fn with_dns_cache(mut self, dns: Arc<DnsCache>) -> Self {
        self.dns = Some(dns);
        self
    }

    /// Default options applied under every call
    pub fn defaults(&self) -> &Options {
        &self.defaults
    }

    /// Add `resolve` pins for the URL's host
    async fn pin_host(&self, url: &str, options: &mut Options) -> Result<()> {
        let parsed = url::Url::parse(url)?;
        let Some(host) = parsed.host_str() else {
            return Ok(());
        };

        let explicit = options.contains_key(keys::RESOLVE);
        let mut pins = match options.get(keys::RESOLVE) {
            None => JsonObject::new(),
            Some(OptionValue::Json(JsonValue::Object(map))) => map.clone(),
            Some(_) => {
                return Err(Error::invalid_option(
                    keys::RESOLVE,
                    "expected an object of host to IP",
                ))
            }
        };

        if self.config.internal_dns_resolve && !explicit {
            if let Some(dns) = &self.dns {
                let ip = dns.resolve(host).await;
                if ip != host {
                    debug!(url, host, resolved_ip = %ip, "SmartTransport DNS resolved");
                    pins.insert(host.to_string(), JsonValue::String(ip));
                }
            }
        }

        if let Some(ip) = self.config.dns_overrides.get(host) {
            debug!(url, host, resolved_ip = %ip, "SmartTransport using domain-specific DNS");
            pins.insert(host.to_string(), JsonValue::String(ip.clone()));
        }

        if !pins.is_empty() {
            options.insert(keys::RESOLVE, JsonValue::Object(pins));
        }
        Ok(())
    }

    /// Get (or build) the reqwest client for the option profile
    pub(super) async fn client_for(&self, options: &Options) -> Result<Client> {
        let profile = ClientProfile::from_options(options)?;
        if profile.is_default() {
            return Ok(self.base.clone());
        }

        if let Some(client) = self.profiles.read().await.get(&profile) {
            return Ok(client);
        }

        let mut profiles = self.profiles.write().await;
        if let Some(client) = profiles.get(&profile) {
            return Ok(client);
        }

        let mut builder = Client::builder().user_agent(&self.user_agent);
        if let Some(proxy) = &profile.proxy {
            builder = builder.proxy(Proxy::all(proxy.as_str())?);
        }
        for (host, ip) in &profile.pins {
            let ip: IpAddr = ip.parse().map_err(|_| {
                Error::invalid_option(keys::RESOLVE, format!("'{ip}' is not an IP for {host}"))
            })?;
            // reqwest ignores this port and keeps the one from the URL
            builder = builder.resolve(host, SocketAddr::new(ip, 0));
        }

        let client = builder.build()?;
        profiles.insert(profile, client.clone());
        Ok(client)
    }

    /// Number of cached per-profile clients
    pub(super) async fn profile_count(&self) -> usize {
        self.profiles.read().await.clients.len()
    }

    fn build_request(
        &self,
        client: &Client,
        method: &str,
        url: &str,
        options: Options,
    ) -> Result<RequestBuilder> {
        let method = Method::from_bytes(method.to_uppercase().as_bytes())
            .map_err(|_| Error::invalid_option("method", format!("invalid method '{method}'")))?;
        let mut req = client.request(method, url);

        for (key, value) in options {
            match key.as_str() {
                keys::HEADERS => {
                    for (name, v) in expect_object(&key, &value)? {
                        req = req.header(name.as_str(), scalar_to_string(v));
                    }
                }
                keys::QUERY => {
                    let pairs: Vec<(String, String)> = expect_object(&key, &value)?
                        .iter()
                        .map(|(k, v)| (k.clone(), scalar_to_string(v)))
                        .collect();
                    req = req.query(&pairs);
                }
                keys::JSON => {
                    if let Some(body) = value.as_json() {
                        req = req.json(body);
                    }
                }
                keys::BODY => {
                    req = match value {
                        OptionValue::Handle(handle) => {
                            let stream = handle.take().ok_or_else(|| Error::BodyConsumed {
                                kind: handle.kind().to_string(),
                            })?;
                            req.body(reqwest::Body::wrap_stream(stream))
                        }
                        OptionValue::Json(JsonValue::String(text)) => req.body(text),
                        OptionValue::Json(JsonValue::Object(fields)) => {
                            let form: Vec<(String, String)> = fields
                                .iter()
                                .map(|(k, v)| (k.clone(), scalar_to_string(v)))
                                .collect();
                            req.form(&form)
                        }
                        OptionValue::Json(other) => req.body(other.to_string()),
                    };
                }
                keys::TIMEOUT => {
                    if let Some(seconds) = value.as_f64().filter(|s| *s > 0.0) {
                        req = req.timeout(Duration::from_secs_f64(seconds));
                    }
                }
                keys::PROXY | keys::RESOLVE => {}
                other => trace!(option = other, "Ignoring unsupported transport option"),
            }
        }

        Ok(req)
    }
}

#[async_trait]
impl Transport for SmartTransport {
    async fn request(&self, method: &str, url: &str, mut options: Options) -> Result<Response> {
        let start = Instant::now();
        options.merge_defaults(&self.defaults);
        debug!(method, url, "SmartTransport request started");

        self.pin_host(url, &mut options).await?;
        let client = self.client_for(&options).await?;
        let req = self.build_request(&client, method, url, options)?;

        match req.send().await {
            Ok(resp) => {
                let response = Response::from_reqwest(resp);
                info!(
                    method,
                    url,
                    duration = start.elapsed().as_secs_f64(),
                    status = response.status_code(),
                    "SmartTransport request completed"
                );
                Ok(response)
            }
            Err(e) => {
                error!(
                    method,
                    url,
                    duration = start.elapsed().as_secs_f64(),
                    error = %e,
                    "SmartTransport request failed"
                );
                Err(e.into())
            }
        }
    }

    fn with_options(&self, options: Options) -> Arc<dyn Transport> {
        let mut defaults = options;
        defaults.merge_defaults(&self.defaults);
        Arc::new(Self {
            defaults,
            ..self.clone()
        })
    }
}

impl std::fmt::Debug for SmartTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartTransport")
            .field("defaults", &self.defaults)
            .field("has_dns_cache", &self.dns.is_some())
            .finish_non_exhaustive()
    }
}

fn expect_object<'a>(key: &str, value: &'a OptionValue) -> Result<&'a JsonObject> {
    match value {
        OptionValue::Json(JsonValue::Object(map)) => Ok(map),
        _ => Err(Error::invalid_option(key, "expected an object")),
    }
}

fn scalar_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
