/// service.rs — Fit and predict pipelines shared by the HTTP handlers and CLI
///
/// Every call opens its own SQLite connection and artifact repository
/// handle; both are dropped when the call returns. The optimizer runs on
/// the blocking pool so the async workers stay responsive.
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use garch_engine::{
    AlphaVantageClient, AppConfig, ArtifactRepository, GarchEstimator, MarketDataFetcher,
    ModelError, PriceStore, Ticker, VolatilityModel,
};

/// Shared, read-only request context.
#[derive(Clone)]
pub struct ApiState {
    pub config:  Arc<AppConfig>,
    pub fetcher: Arc<dyn MarketDataFetcher>,
}

impl ApiState {
    pub fn new(config: AppConfig, fetcher: Arc<dyn MarketDataFetcher>) -> Self {
        Self { config: Arc::new(config), fetcher }
    }

    /// State backed by the live AlphaVantage client.
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let client = AlphaVantageClient::from_config(&config)?;
        Ok(Self::new(config, Arc::new(client)))
    }

    fn model(&self, ticker: Ticker, use_new_data: bool) -> Result<VolatilityModel, ModelError> {
        let store = PriceStore::open(&self.config.db_name)?;
        let artifacts = ArtifactRepository::new(&self.config.model_directory);
        Ok(
            VolatilityModel::new(ticker, use_new_data, store, self.fetcher.clone(), artifacts)
                .with_estimator(Box::new(GarchEstimator::from_config(&self.config))),
        )
    }
}

#[derive(Debug, Clone)]
pub struct FitReport {
    pub ticker: Ticker,
    pub path:   PathBuf,
    pub aic:    f64,
    pub bic:    f64,
    pub n_obs:  usize,
}

impl FitReport {
    pub fn message(&self) -> String {
        format!(
            "Trained and saved {}\nMetrics: AIC {}, BIC {}.",
            self.path.display(),
            self.aic,
            self.bic
        )
    }
}

/// Wrangle, fit GARCH(p, q) and save a new artifact.
pub async fn fit(
    state: &ApiState,
    ticker: &str,
    use_new_data: bool,
    n_observations: i64,
    p: i64,
    q: i64,
) -> Result<FitReport, ModelError> {
    let ticker = Ticker::parse(ticker)?;
    let n_observations = usize::try_from(n_observations).map_err(|_| {
        ModelError::Data(format!("n_observations must be non-negative, got {n_observations}"))
    })?;
    let (p, q) = match (usize::try_from(p), usize::try_from(q)) {
        (Ok(p), Ok(q)) => (p, q),
        _ => return Err(ModelError::Fit(format!("GARCH order must be non-negative, got p={p}, q={q}"))),
    };

    let mut model = state.model(ticker.clone(), use_new_data)?;
    model.wrangle_data(n_observations).await?;

    let report = tokio::task::spawn_blocking(move || -> Result<FitReport, ModelError> {
        model.fit(p, q)?;
        let path = model.dump()?;
        let fit = model
            .fit_summary()
            .ok_or_else(|| ModelError::Fit("model lost its fit after saving".into()))?;
        Ok(FitReport {
            ticker: model.ticker().clone(),
            path,
            aic: fit.aic,
            bic: fit.bic,
            n_obs: fit.n_obs,
        })
    })
    .await
    .map_err(|e| ModelError::Fit(format!("fit task failed: {e}")))??;

    info!(
        "{}: trained on {} obs, saved {}",
        report.ticker,
        report.n_obs,
        report.path.display()
    );
    Ok(report)
}

/// Load the latest artifact for `ticker` and forecast `n_days` ahead.
pub async fn predict(
    state: &ApiState,
    ticker: &str,
    n_days: i64,
) -> Result<BTreeMap<String, f64>, ModelError> {
    let ticker = Ticker::parse(ticker)?;
    let horizon = usize::try_from(n_days)
        .map_err(|_| ModelError::Predict(format!("n_days must be at least 1, got {n_days}")))?;

    let mut model = state.model(ticker, false)?;
    model.load()?;
    model.predict_volatility(horizon)
}
