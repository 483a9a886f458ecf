//! Cache module
//!
//! Keyed TTL stores and the response cache decorator.
//!
//! Response caching is disabled unless the runtime is configured with
//! `response_cache_enabled`. In read-through mode the body is buffered once
//! and the caller receives a buffered copy, so nothing downstream loses it.

mod store;
mod transport;

pub use store::{CacheStore, Compute, MemoryCacheStore};
pub use transport::{response_cache_key, CacheMode, CacheTransport, DEFAULT_CACHE_TTL_SECS};
