//! # Solidafy HTTP
//!
//! A decorated HTTP client core for talking to external APIs.
//!
//! ## Features
//!
//! - **Composable transports**: lock, cache and retry decorators around a single base transport
//! - **Distributed-style locking**: serialize calls sharing a lock key
//! - **DNS cache**: resolve hosts once, pin them on the transport
//! - **Proxy routing**: send matching domains through a proxy
//! - **Audit logging**: one durable record per call, plus slow-request diagnostics
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use solidafy_http::client::{ApiClient, ClientRuntime, TextClient};
//! use solidafy_http::config::ClientConfig;
//! use solidafy_http::request::HttpClientRequest;
//!
//! #[tokio::main]
//! async fn main() -> solidafy_http::Result<()> {
//!     let runtime = ClientRuntime::new(ClientConfig::from_env())?;
//!     let client = TextClient::new(runtime, "https://api.example.com");
//!
//!     let request = HttpClientRequest::new("/orders/42")
//!         .with_retries(2)
//!         .with_lock("orders:42");
//!     let body = client.request(&request).await?;
//!     println!("{body}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        ApiClient                                │
//! │  request()    silent_request()    async_request()    check()    │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//!              RequestLogger ── RequestExecutor ── ProxySelector
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────────────────────┐
//! │  Cache   │   Lock    │    Retry      │  SmartTransport (reqwest) │
//! │ outermost│ per key   │ opt-in        │  DNS pinning, proxy       │
//! └──────────┴───────────┴───────────────┴───────────────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and the transport option map
pub mod types;

/// Client configuration
pub mod config;

/// Transport trait, responses and the reqwest base transport
pub mod transport;

/// TTL stores and the response cache decorator
pub mod cache;

/// DNS resolution cache
pub mod dns;

/// Named locks and the lock decorator
pub mod lock;

/// Retry decorator
pub mod retry;

/// Proxy routing by URL substring
pub mod proxy;

/// Request/response lifecycle events
pub mod events;

/// Request executor
pub mod engine;

/// Request audit logging
pub mod logging;

/// Logical requests and capability traits
pub mod request;

/// API clients and the shared client runtime
pub mod client;

/// Command-line interface
pub mod cli;

#[cfg(test)]
mod test_support;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use client::{ApiClient, ClientRuntime, HealthStatus, ResponseClient, TextClient};
pub use config::ClientConfig;
pub use request::{ApiRequest, AutoRetry, Cacheable, HttpClientRequest, Lockable};
pub use transport::{Response, Transport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
