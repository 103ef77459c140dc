/// lib.rs — GARCH volatility engine
///
/// Price history in (AlphaVantage → SQLite), GARCH(p,q) fit on percentage
/// returns, business-day volatility forecasts out, fitted models persisted
/// as timestamped JSON artifacts.
pub mod artifacts;
pub mod calendar;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod returns;
pub mod store;
pub mod volatility;

#[cfg(test)]
mod testing;

pub use artifacts::{ArtifactError, ArtifactRecord, ArtifactRepository};
pub use config::AppConfig;
pub use error::{ErrorKind, ModelError};
pub use fetcher::{AlphaVantageClient, FetchError, MarketDataFetcher, StaticFetcher};
pub use models::estimator::{GarchEstimator, VolatilityEstimator};
pub use models::garch::{GarchFit, GarchParams};
pub use models::{ForecastPoint, PriceBar, Ticker};
pub use store::{PriceStore, StoreError};
pub use volatility::{ModelArtifact, ModelState, VolatilityModel, MAX_FORECAST_HORIZON};
