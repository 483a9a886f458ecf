//! Solidafy HTTP CLI
//!
//! Command-line interface for the decorated HTTP client

use clap::Parser;
use solidafy_http::cli::{Cli, Runner};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    let runner = Runner::new(cli);
    runner.run().await?;
    Ok(())
}
