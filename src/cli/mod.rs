//! CLI module
//!
//! Command-line interface for sending requests through the client chain.
//!
//! # Commands
//!
//! - `request` - Send one request with optional lock, cache and retry
//! - `check` - Check that a base URL's host resolves
//! - `resolve` - Resolve a hostname through the DNS cache
//! - `config` - Show the effective configuration

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
