//! Sentinel CLI - a command line client for Sentinel sensor monitoring.
//!
//! Shows live sensor readings, news and profile data from the Sentinel
//! backend, and falls back to bundled reference data when the backend is
//! unreachable.

mod cli;
mod format;

use std::io;

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // RUST_LOG controls the level (e.g., RUST_LOG=sentinel_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    cli::run().await
}
