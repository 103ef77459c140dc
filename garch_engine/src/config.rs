/// config.rs — Centralised configuration loaded from .env
///
/// All parameters consumed by the volatility service are defined here.
/// Loading happens once at startup; every request borrows &AppConfig.
use anyhow::Result;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ALPHA_BASE_URL: &str = "https://www.alphavantage.co";
pub const DEFAULT_API_PORT: u16 = 8008;

#[derive(Debug, Clone)]
pub struct AppConfig {
    // ── AlphaVantage ─────────────────────────────────────────────────
    pub alpha_api_key:  String,
    pub alpha_base_url: String,
    /// Per-request timeout for the market data client
    pub http_timeout_secs: u64,

    // ── Storage ──────────────────────────────────────────────────────
    /// SQLite file holding one price table per ticker
    pub db_name: PathBuf,
    /// Directory of `<timestamp>_<TICKER>.json` model artifacts
    pub model_directory: PathBuf,

    // ── HTTP surface ─────────────────────────────────────────────────
    pub api_host: String,
    pub api_port: u16,

    // ── GARCH estimator ──────────────────────────────────────────────
    /// Nelder-Mead iterations per optimizer pass
    pub garch_max_iterations: usize,
    /// Relative objective spread at which a pass has converged
    pub garch_tolerance: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            alpha_api_key: "demo".into(),
            alpha_base_url: DEFAULT_ALPHA_BASE_URL.into(),
            http_timeout_secs: 30,
            db_name: PathBuf::from("stocks.sqlite"),
            model_directory: PathBuf::from("models"),
            api_host: "0.0.0.0".into(),
            api_port: DEFAULT_API_PORT,
            garch_max_iterations: 5_000,
            garch_tolerance: 1e-9,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables (after dotenv).
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // ignore missing .env
        let defaults = Self::default();

        let cfg = Self {
            alpha_api_key: env::var("ALPHA_API_KEY").unwrap_or(defaults.alpha_api_key),
            alpha_base_url: env::var("ALPHA_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_owned())
                .unwrap_or(defaults.alpha_base_url),
            http_timeout_secs: parse_env("HTTP_TIMEOUT_SECS", defaults.http_timeout_secs)?,

            db_name: env::var("DB_NAME").map(PathBuf::from).unwrap_or(defaults.db_name),
            model_directory: env::var("MODEL_DIRECTORY")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_directory),

            api_host: env::var("API_HOST").unwrap_or(defaults.api_host),
            api_port: parse_env("API_PORT", defaults.api_port)?,

            garch_max_iterations: parse_env("GARCH_MAX_ITERATIONS", defaults.garch_max_iterations)?,
            garch_tolerance: parse_env("GARCH_TOLERANCE", defaults.garch_tolerance)?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.garch_max_iterations == 0 {
            anyhow::bail!("Config key GARCH_MAX_ITERATIONS must be positive");
        }
        if !(self.garch_tolerance.is_finite() && self.garch_tolerance > 0.0) {
            anyhow::bail!("Config key GARCH_TOLERANCE must be a positive number");
        }
        if self.http_timeout_secs == 0 {
            anyhow::bail!("Config key HTTP_TIMEOUT_SECS must be positive");
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn bind_address(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.api_host, self.api_port);
        addr.parse()
            .map_err(|e| anyhow::anyhow!("Config API_HOST/API_PORT {addr}: {e}"))
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr + Copy,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Config key {key}: {e}")),
        Err(_) => Ok(default),
    }
}
