//! Binary crate for the `weather-dashboard` server.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Serving the weather HTTP API
//! - Logging setup

use clap::Parser;

mod cli;
mod server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so `show` output stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cmd = cli::Cli::parse();
    cmd.run().await
}
