//! Client module
//!
//! API clients send logical requests through a per-call decorator chain
//! (base transport, retry, lock, cache) and log every call.
//!
//! # Call modes
//!
//! - `request` - propagates errors
//! - `silent_request` - logs errors and returns `None`
//! - `async_request` - runs in the background, errors are only logged

mod api;
mod generic;
mod runtime;
mod types;

pub use api::ApiClient;
pub use generic::{ResponseClient, TextClient};
pub use runtime::{ClientRuntime, ClientRuntimeBuilder};
pub use types::{join_url, HealthStatus};
