//! Main application entry point (HTTP service binary).
//!
//! A thin wrapper around the `chipflow` library that handles:
//! - Environment variable loading (.env file)
//! - Command-line argument parsing
//! - Logger initialization
//! - Serving until Ctrl+C / SIGTERM
//!
//! All core functionality is implemented in the library crate.

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use chipflow::server::{serve, shutdown_signal};
use chipflow::{init_context, init_logger_with, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the process environment still applies
    let _ = dotenvy::dotenv();

    let config = Config::parse();

    init_logger_with(config.log_level.clone().into(), config.log_format.clone())
        .context("Failed to initialize logger")?;

    let addr = config
        .bind_addr()
        .context("Invalid bind address or port")?;
    let ctx = init_context(&config)
        .await
        .context("Failed to initialize database access")?;

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    serve(ctx, addr, shutdown)
        .await
        .context("HTTP server failed")?;

    Ok(())
}
