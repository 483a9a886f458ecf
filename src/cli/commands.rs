//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Solidafy HTTP client CLI
#[derive(Parser, Debug)]
#[command(name = "solidafy-http")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Client configuration file (YAML). Environment variables are applied on top.
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Print request/response events as they happen
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one request through the full client chain
    Request {
        /// Absolute URL, or a path joined with --base-url
        target: String,

        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Base URL for relative targets
        #[arg(long)]
        base_url: Option<String>,

        /// Request header as "Name: value" (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Query parameter as "name=value" (repeatable)
        #[arg(short, long = "query")]
        query: Vec<String>,

        /// Inline JSON body
        #[arg(long)]
        json: Option<String>,

        /// Serialize concurrent calls sharing this key
        #[arg(long)]
        lock_key: Option<String>,

        /// Response cache key
        #[arg(long)]
        cache_key: Option<String>,

        /// Response cache TTL in seconds
        #[arg(long, default_value = "60")]
        cache_ttl: u64,

        /// Extra attempts for transient failures (0 = no retry)
        #[arg(long, default_value = "0")]
        retries: u32,

        /// Append the request log record to this JSON lines file
        #[arg(long)]
        log_file: Option<PathBuf>,
    },

    /// Check that the host of a base URL resolves
    Check {
        /// Base URL to check
        base_url: String,
    },

    /// Resolve a hostname through the DNS cache
    Resolve {
        /// Hostname
        host: String,
    },

    /// Show the effective client configuration
    Config,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}
