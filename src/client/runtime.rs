//! Shared collaborators for API clients
//!
//! A `ClientRuntime` owns everything a client needs to send requests: the
//! base transport, lock and cache stores, the DNS cache, the executor and the
//! request logger. The decorator chain is built fresh for every call.

use super::api::ApiClient;
use super::types::HealthStatus;
use crate::cache::{CacheMode, CacheStore, CacheTransport, MemoryCacheStore};
use crate::config::ClientConfig;
use crate::dns::{DnsCache, Resolver, SystemResolver};
use crate::engine::RequestExecutor;
use crate::error::Result;
use crate::events::{EventDispatcher, NoopDispatcher};
use crate::lock::{LockFactory, LockTransport, MemoryLockFactory};
use crate::logging::{
    InFlightLog, LogContext, LogSink, NullLogSink, RequestLogger, RequestTrace,
};
use crate::proxy::ProxySelector;
use crate::request::ApiRequest;
use crate::retry::RetryTransport;
use crate::transport::{SmartTransport, Transport};
use crate::types::{keys, Options};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info};

/// Collaborators shared by every call a client makes
#[derive(Clone)]
pub struct ClientRuntime {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    locks: Arc<dyn LockFactory>,
    cache: Arc<dyn CacheStore>,
    dns: Arc<DnsCache>,
    executor: RequestExecutor,
    logger: RequestLogger,
}

impl ClientRuntime {
    /// Start building a runtime
    pub fn builder(config: ClientConfig) -> ClientRuntimeBuilder {
        ClientRuntimeBuilder::new(config)
    }

    /// Runtime with default collaborators
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The undecorated base transport
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn dns(&self) -> &DnsCache {
        &self.dns
    }

    pub fn logger(&self) -> &RequestLogger {
        &self.logger
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Overlay cache, lock and timeout options for `request`
    pub fn prepare_options(&self, request: &dyn ApiRequest, options: Option<Options>) -> Options {
        let mut options = options.unwrap_or_default();

        if let Some(cacheable) = request.as_cacheable() {
            let key = cacheable.cache_key();
            let ttl = cacheable.cache_ttl();
            if !key.is_empty() && ttl > 0 {
                options.insert(keys::CACHE_KEY, key);
                options.insert(keys::CACHE_TTL, ttl);
            }
        }

        if let Some(lockable) = request.as_lockable() {
            let key = lockable.lock_key();
            if !key.is_empty() {
                options.insert(keys::LOCK_KEY, key);
            }
        }

        if !options.contains_key(keys::TIMEOUT) {
            options.insert(keys::TIMEOUT, self.config.default_timeout_seconds);
        }

        options
    }

    /// Build the transport chain for `request`: base, then retry when opted
    /// in, then lock, then cache outermost
    pub fn build_chain(&self, request: &dyn ApiRequest) -> Arc<dyn Transport> {
        let mut transport = Arc::clone(&self.transport);

        if let Some(retry) = request.as_auto_retry() {
            let max_retries = retry.max_retries();
            if max_retries > 0 {
                transport = Arc::new(RetryTransport::new(
                    transport,
                    max_retries,
                    self.config.retry.clone(),
                ));
            }
        }

        let transport: Arc<dyn Transport> =
            Arc::new(LockTransport::new(transport, Arc::clone(&self.locks)));

        let mode = if self.config.response_cache_enabled {
            CacheMode::ReadThrough
        } else {
            CacheMode::PassThrough
        };
        Arc::new(CacheTransport::new(transport, Arc::clone(&self.cache), mode))
    }

    /// Run one request for `client`, logging it on every exit path
    pub async fn execute<C: ApiClient + ?Sized>(
        &self,
        client: &C,
        request: &dyn ApiRequest,
    ) -> Result<C::Output> {
        let method = request
            .request_method()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| client.default_method(request));
        let url = client.request_url(request)?;
        let options = self.prepare_options(request, client.request_options(request)?);

        let log = self.logger.initialize(&method, &url, &options, request);
        let mut in_flight = InFlightLog::new(self.logger.clone(), log);

        let result = self
            .run(client, request, &method, &url, options, &mut in_flight)
            .await;

        in_flight.finish(result.as_ref().err()).await;
        result
    }

    async fn run<C: ApiClient + ?Sized>(
        &self,
        client: &C,
        request: &dyn ApiRequest,
        method: &str,
        url: &str,
        options: Options,
        in_flight: &mut InFlightLog,
    ) -> Result<C::Output> {
        let transport = self.build_chain(request);
        let execution = self
            .executor
            .send(transport.as_ref(), method, url, options.clone())
            .await?;

        let duration_millis = execution.duration_millis();
        let (status_code, started_at, finished_at) =
            (execution.status_code, execution.started_at, execution.finished_at);
        if let Some(log) = in_flight.log_mut() {
            log.set_duration(execution.duration);
        }

        let output = client.format_response(request, execution.response).await?;

        let mut content = String::new();
        if let Some(log) = in_flight.log_mut() {
            self.logger.update_with_result(log, &output);
            content = log.response.clone().unwrap_or_default();
        }

        self.logger.log_request_response(&RequestTrace {
            client: client.label(),
            method,
            url,
            options: &options,
            status_code,
            content: &content,
            started_at,
            finished_at,
            duration_millis,
        });

        Ok(output)
    }

    /// Check the host of `base_url` through the DNS cache
    pub async fn check(&self, base_url: &str) -> HealthStatus {
        if base_url.is_empty() {
            return HealthStatus::skip("client has no base URL");
        }

        let host = match url::Url::parse(base_url) {
            Ok(parsed) => match parsed.host_str() {
                Some(host) => host.trim_matches(|c: char| c == '[' || c == ']').to_string(),
                None => return HealthStatus::failure(format!("{base_url}: no host")),
            },
            Err(e) => return HealthStatus::failure(format!("{base_url}: {e}")),
        };

        if host.parse::<IpAddr>().is_ok() {
            return HealthStatus::success(format!("{host} is an IP address"));
        }

        let ip = self.dns.refresh(&host).await;
        if ip == host {
            info!(host = %host, "Health check failed to resolve host");
            return HealthStatus::failure(format!("{host}: DNS resolution failed"));
        }

        debug!(host = %host, ip = %ip, "Health check resolved host");
        HealthStatus::success(format!("{host} resolved to {ip}"))
    }
}

impl std::fmt::Debug for ClientRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRuntime")
            .field("config", &self.config)
            .field("executor", &self.executor)
            .field("logger", &self.logger)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ClientRuntime`]; every collaborator has a default
pub struct ClientRuntimeBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    locks: Option<Arc<dyn LockFactory>>,
    cache: Option<Arc<dyn CacheStore>>,
    resolver: Option<Arc<dyn Resolver>>,
    events: Option<Arc<dyn EventDispatcher>>,
    sink: Option<Arc<dyn LogSink>>,
    context: Option<Arc<dyn LogContext>>,
}

impl ClientRuntimeBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            locks: None,
            cache: None,
            resolver: None,
            events: None,
            sink: None,
            context: None,
        }
    }

    /// Replace the base transport (defaults to [`SmartTransport`])
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn lock_factory(mut self, locks: Arc<dyn LockFactory>) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Store shared by the response cache and the DNS cache
    #[must_use]
    pub fn cache_store(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn event_dispatcher(mut self, events: Arc<dyn EventDispatcher>) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn log_context(mut self, context: Arc<dyn LogContext>) -> Self {
        self.context = Some(context);
        self
    }

    /// Build the runtime
    pub fn build(self) -> Result<ClientRuntime> {
        self.config.validate()?;
        let config = Arc::new(self.config);

        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(MemoryCacheStore::new()));
        let resolver = self.resolver.unwrap_or_else(|| Arc::new(SystemResolver));
        let dns = Arc::new(DnsCache::new(
            Arc::clone(&cache),
            resolver,
            Arc::clone(&config),
        ));

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(
                SmartTransport::new(Arc::clone(&config))?.with_dns_cache(Arc::clone(&dns)),
            ),
        };

        let events = self.events.unwrap_or_else(|| Arc::new(NoopDispatcher));
        let executor = RequestExecutor::new(events, ProxySelector::from_config(&config));

        let mut logger = RequestLogger::new(self.sink.unwrap_or_else(|| Arc::new(NullLogSink)))
            .with_slow_threshold(config.slow_request_threshold_millis);
        if let Some(context) = self.context {
            logger = logger.with_context(context);
        }

        Ok(ClientRuntime {
            locks: self
                .locks
                .unwrap_or_else(|| Arc::new(MemoryLockFactory::new())),
            config,
            transport,
            cache,
            dns,
            executor,
            logger,
        })
    }
}
