//! Request execution module
//!
//! Drives one call through proxy selection, the transport and timing.
//!
//! # Overview
//!
//! The engine module provides:
//! - `RequestExecutor` - Sends a call and emits lifecycle events
//! - `Execution` - Response plus timing of one call
//!
//! The executor never formats or persists anything, and it only reads the
//! status of a response so deferred bodies stay intact.

mod types;

pub use types::{round_to, Execution};

use crate::error::Result;
use crate::events::{EventDispatcher, HttpEvent, NoopDispatcher, RequestEvent, ResponseEvent};
use crate::proxy::ProxySelector;
use crate::transport::Transport;
use crate::types::Options;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Sends calls through a transport with proxy rules and timing
#[derive(Clone)]
pub struct RequestExecutor {
    events: Arc<dyn EventDispatcher>,
    proxy: ProxySelector,
}

impl RequestExecutor {
    /// Create an executor
    pub fn new(events: Arc<dyn EventDispatcher>, proxy: ProxySelector) -> Self {
        Self { events, proxy }
    }

    /// The proxy rules applied to every call
    pub fn proxy(&self) -> &ProxySelector {
        &self.proxy
    }

    /// Send a call. Transport errors propagate unchanged.
    pub async fn send(
        &self,
        transport: &dyn Transport,
        method: &str,
        url: &str,
        options: Options,
    ) -> Result<Execution> {
        self.events.dispatch(HttpEvent::Request(RequestEvent {
            method: method.to_string(),
            url: url.to_string(),
            options: options.clone(),
        }));

        let started_at = Utc::now();
        let start = Instant::now();
        let options = self.proxy.apply(url, options);

        let response = transport.request(method, url, options.clone()).await?;

        let elapsed = start.elapsed();
        let finished_at = std::cmp::max(Utc::now(), started_at);
        let duration = round_to(elapsed.as_secs_f64(), 6);
        let status_code = response.status_code();

        debug!(method, url, duration, status_code, "Request executed");

        self.events.dispatch(HttpEvent::Response(ResponseEvent {
            method: method.to_string(),
            url: url.to_string(),
            options,
            duration,
            status_code,
        }));

        Ok(Execution {
            response,
            duration,
            started_at,
            finished_at,
            status_code,
        })
    }
}

impl Default for RequestExecutor {
    fn default() -> Self {
        Self::new(Arc::new(NoopDispatcher), ProxySelector::default())
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("proxy", &self.proxy)
            .finish_non_exhaustive()
    }
}
