/// main.rs — Forecast API entry point
///
///   1. Initialise logging (RUST_LOG, default info)
///   2. Load config from .env
///   3. Dispatch the CLI subcommand
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use forecast_api::cli::{self, Cli};
use garch_engine::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // ── Config ───────────────────────────────────────────────────────────
    let config = AppConfig::from_env()?;

    cli::run(cli, config).await
}
