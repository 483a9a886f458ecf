//! DNS resolution cache
//!
//! Resolves hostnames to IPv4 literals and keeps the answers in a shared
//! cache store under `resolve:<host>`. A failed lookup yields the host back,
//! so callers detect failure by comparing input and output.

mod resolver;

pub use resolver::{DnsCache, Resolver, SystemResolver};

#[cfg(test)]
mod tests;
