//! Transport module
//!
//! The `Transport` trait is the seam every decorator wraps. A decorator owns
//! exactly one inner transport and forwards everything it does not intercept.
//!
//! # Features
//!
//! - **Lazy bodies**: status and headers without draining the body
//! - **Option rebinding**: `with_options` returns a transport with new defaults
//! - **Smart base transport**: reqwest execution with proxy and DNS pinning

mod response;
mod smart;

pub use response::{CachedResponse, Response};
pub use smart::{SmartTransport, MAX_CLIENT_PROFILES};

use crate::error::Result;
use crate::types::{ByteStream, Options};
use async_trait::async_trait;
use std::sync::Arc;

/// Something that can perform an HTTP call
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request. Options are transport-specific (see [`crate::types::keys`]).
    async fn request(&self, method: &str, url: &str, options: Options) -> Result<Response>;

    /// Stream the body of a response obtained from this transport
    fn stream(&self, response: Response) -> ByteStream {
        response.into_stream()
    }

    /// A transport that applies `options` underneath every call's own options
    fn with_options(&self, options: Options) -> Arc<dyn Transport>;
}
