/// cli.rs — Command-line interface
///
/// Usage:
///   forecast-api serve [--host 127.0.0.1] [--port 8008]
///   forecast-api fit --ticker AAPL [--use-new-data] [--n-observations 2500] [-p 1] [-q 1]
///   forecast-api predict --ticker AAPL [--n-days 5]
///   forecast-api models [--ticker AAPL]
///
/// Every subcommand except `serve` runs the pipeline in-process against the
/// same database and model directory the server uses.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use garch_engine::{AppConfig, ArtifactRepository, PriceStore, Ticker};

use crate::api;
use crate::service::{self, ApiState};

#[derive(Parser)]
#[command(name = "forecast-api")]
#[command(about = "GARCH volatility forecasting service")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Bind host (overrides API_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides API_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Fit a GARCH(p, q) model and save it
    Fit {
        /// Ticker symbol (e.g., AAPL)
        #[arg(short, long)]
        ticker: String,

        /// Refresh price history from AlphaVantage first
        #[arg(short, long)]
        use_new_data: bool,

        /// Number of most recent returns to fit on
        #[arg(short, long, default_value = "2500")]
        n_observations: i64,

        /// Lagged variance terms
        #[arg(short, default_value = "1")]
        p: i64,

        /// Lagged squared-shock terms
        #[arg(short, default_value = "1")]
        q: i64,
    },

    /// Forecast volatility from the latest saved model
    Predict {
        /// Ticker symbol (e.g., AAPL)
        #[arg(short, long)]
        ticker: String,

        /// Business days to forecast
        #[arg(short, long, default_value = "5")]
        n_days: i64,
    },

    /// List saved models for a ticker, or stored price tables
    Models {
        /// Ticker symbol; omit to list every stored ticker
        #[arg(short, long)]
        ticker: Option<String>,
    },
}

pub async fn run(cli: Cli, mut config: AppConfig) -> Result<()> {
    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.api_host = host;
            }
            if let Some(port) = port {
                config.api_port = port;
            }
            let addr = config.bind_address()?;
            print_banner(&config);
            api::serve(ApiState::from_config(config)?, addr).await
        }

        Commands::Fit { ticker, use_new_data, n_observations, p, q } => {
            let state = ApiState::from_config(config)?;
            let report = service::fit(&state, &ticker, use_new_data, n_observations, p, q)
                .await
                .with_context(|| format!("fit failed for {ticker}"))?;
            println!("{}", report.message());
            Ok(())
        }

        Commands::Predict { ticker, n_days } => {
            let state = ApiState::from_config(config)?;
            let forecast = service::predict(&state, &ticker, n_days)
                .await
                .with_context(|| format!("predict failed for {ticker}"))?;

            println!("{:<12} {:>12}", "date", "volatility");
            for (date, vol) in &forecast {
                println!("{:<12} {:>12.6}", date, vol);
            }
            Ok(())
        }

        Commands::Models { ticker: Some(ticker) } => {
            let ticker = Ticker::parse(&ticker)?;
            let repo = ArtifactRepository::new(&config.model_directory);
            let records = repo.list(&ticker)?;
            if records.is_empty() {
                println!("No model trained for {ticker}");
                return Ok(());
            }
            for record in records {
                println!(
                    "{}  {}  {}",
                    record.created_at.format("%Y-%m-%d %H:%M:%S%.6f"),
                    record.file,
                    record.sha256.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }

        Commands::Models { ticker: None } => {
            let store = PriceStore::open(&config.db_name)
                .with_context(|| format!("cannot open {}", config.db_name.display()))?;
            let repo = ArtifactRepository::new(&config.model_directory);
            println!("{:<16} {:>8} {:>8}", "ticker", "rows", "models");
            for ticker in store.tickers()? {
                println!(
                    "{:<16} {:>8} {:>8}",
                    ticker,
                    store.row_count(&ticker)?,
                    repo.list(&ticker)?.len()
                );
            }
            Ok(())
        }
    }
}

fn print_banner(config: &AppConfig) {
    info!("╔══════════════════════════════════════════════╗");
    info!("║      GARCH VOLATILITY FORECAST SERVICE       ║");
    info!("╚══════════════════════════════════════════════╝");
    info!(
        "Storage: db={} models={}",
        config.db_name.display(),
        config.model_directory.display()
    );
    info!(
        "GARCH:   max_iterations={} tolerance={:.1e}",
        config.garch_max_iterations, config.garch_tolerance
    );
}
