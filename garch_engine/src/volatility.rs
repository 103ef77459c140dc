/// volatility.rs — Per-ticker volatility model orchestration
///
/// STATE MACHINE:
///
///   Empty ──wrangle_data──▶ DataLoaded ──fit──▶ Fitted
///     │                        ▲   │              │
///     │                        └───┴─wrangle_data─┘
///     └──load──▶ LoadedFromDisk
///
///   predict_volatility  Fitted | LoadedFromDisk
///   dump                Fitted
///   load                Empty
///
/// One instance serves one request. The price store handle and artifact
/// repository are injected; nothing here is shared across requests.
/// SQLite work runs on the blocking pool, like the fit in the API layer.
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::artifacts::ArtifactRepository;
use crate::calendar::business_days_after;
use crate::error::ModelError;
use crate::fetcher::MarketDataFetcher;
use crate::models::estimator::{GarchEstimator, VolatilityEstimator};
use crate::models::garch::GarchFit;
use crate::models::{ForecastPoint, ReturnSeries, Ticker};
use crate::returns;
use crate::store::PriceStore;

/// Longest forecast horizon accepted, in business days (about 40 years).
pub const MAX_FORECAST_HORIZON: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Empty,
    DataLoaded,
    Fitted,
    LoadedFromDisk,
}

impl ModelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelState::Empty => "empty",
            ModelState::DataLoaded => "data-loaded",
            ModelState::Fitted => "fitted",
            ModelState::LoadedFromDisk => "loaded-from-disk",
        }
    }
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What `dump` writes and `load` reads back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub ticker:     Ticker,
    pub p:          usize,
    pub q:          usize,
    pub fitted_at:  DateTime<Utc>,
    /// First and last return dates of the training window
    pub first_date: NaiveDate,
    pub last_date:  NaiveDate,
    pub fit:        GarchFit,
}

enum Stage {
    Empty,
    DataLoaded { returns: ReturnSeries },
    Fitted { returns: ReturnSeries, fit: GarchFit, p: usize, q: usize },
    LoadedFromDisk { artifact: ModelArtifact },
}

impl Stage {
    fn state(&self) -> ModelState {
        match self {
            Stage::Empty => ModelState::Empty,
            Stage::DataLoaded { .. } => ModelState::DataLoaded,
            Stage::Fitted { .. } => ModelState::Fitted,
            Stage::LoadedFromDisk { .. } => ModelState::LoadedFromDisk,
        }
    }
}

pub struct VolatilityModel {
    ticker:       Ticker,
    use_new_data: bool,
    store:        Arc<Mutex<PriceStore>>,
    fetcher:      Arc<dyn MarketDataFetcher>,
    artifacts:    ArtifactRepository,
    estimator:    Box<dyn VolatilityEstimator>,
    stage:        Stage,
}

impl VolatilityModel {
    pub fn new(
        ticker: Ticker,
        use_new_data: bool,
        store: PriceStore,
        fetcher: Arc<dyn MarketDataFetcher>,
        artifacts: ArtifactRepository,
    ) -> Self {
        Self {
            ticker,
            use_new_data,
            store: Arc::new(Mutex::new(store)),
            fetcher,
            artifacts,
            estimator: Box::new(GarchEstimator::default()),
            stage: Stage::Empty,
        }
    }

    pub fn with_estimator(mut self, estimator: Box<dyn VolatilityEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn state(&self) -> ModelState {
        self.stage.state()
    }

    /// Refresh the store if requested, then load the last `n_observations`
    /// returns (reads `n_observations + 1` prices).
    pub async fn wrangle_data(&mut self, n_observations: usize) -> Result<(), ModelError> {
        if let Stage::LoadedFromDisk { .. } = self.stage {
            return Err(self.invalid("wrangle data"));
        }

        let fresh = if self.use_new_data {
            Some(self.fetcher.get_daily(&self.ticker).await?)
        } else {
            None
        };

        let store = Arc::clone(&self.store);
        let ticker = self.ticker.clone();
        let limit = n_observations.saturating_add(1);
        let bars = tokio::task::spawn_blocking(move || -> Result<_, ModelError> {
            let mut store = store
                .lock()
                .map_err(|_| ModelError::Storage("price store lock poisoned".into()))?;
            if let Some(fresh) = fresh {
                store.replace(&ticker, &fresh)?;
            }
            Ok(store.read(&ticker, Some(limit))?)
        })
        .await
        .map_err(|e| ModelError::Storage(format!("price store task failed: {e}")))??;
        let returns = returns::build(&bars);
        if returns.is_empty() {
            warn!("{}: only {} price rows, no returns to model", self.ticker, bars.len());
        }
        info!(
            "{}: loaded {} returns ({:?} to {:?})",
            self.ticker,
            returns.len(),
            returns.first_date(),
            returns.last_date()
        );
        self.stage = Stage::DataLoaded { returns };
        Ok(())
    }

    /// Estimate GARCH(p, q) on the loaded returns.
    pub fn fit(&mut self, p: usize, q: usize) -> Result<(), ModelError> {
        let Stage::DataLoaded { returns } = &self.stage else {
            return Err(ModelError::Fit(format!(
                "cannot fit {} while the model is {}; load data first",
                self.ticker,
                self.state()
            )));
        };

        let fit = self.estimator.fit(&returns.values(), p, q)?;
        info!(
            "{}: GARCH({},{}) fitted on {} obs, LL {:.4}, AIC {:.4}, BIC {:.4}",
            self.ticker, p, q, fit.n_obs, fit.log_likelihood, fit.aic, fit.bic
        );
        let returns = returns.clone();
        self.stage = Stage::Fitted { returns, fit, p, q };
        Ok(())
    }

    /// Volatility forecast for the next `horizon` business days after the
    /// last fitted date.
    pub fn predict_points(&self, horizon: usize) -> Result<Vec<ForecastPoint>, ModelError> {
        if horizon < 1 {
            return Err(ModelError::Predict("horizon must be at least 1 day".into()));
        }
        if horizon > MAX_FORECAST_HORIZON {
            return Err(ModelError::Predict(format!(
                "horizon must be at most {MAX_FORECAST_HORIZON} days, got {horizon}"
            )));
        }
        let (fit, last_date) = match &self.stage {
            Stage::Fitted { returns, fit, .. } => (fit, returns.last_date()),
            Stage::LoadedFromDisk { artifact, .. } => (&artifact.fit, Some(artifact.last_date)),
            _ => {
                return Err(ModelError::Predict(format!(
                    "no model attached for {} (state {})",
                    self.ticker,
                    self.state()
                )))
            }
        };
        let last_date = last_date
            .ok_or_else(|| ModelError::Predict("fitted model has no training dates".into()))?;

        let dates = business_days_after(last_date, horizon);
        if dates.len() < horizon {
            return Err(ModelError::Predict(format!(
                "cannot label {horizon} business days after {last_date}"
            )));
        }

        Ok(dates
            .into_iter()
            .zip(fit.forecast_volatility(horizon))
            .map(|(date, volatility)| ForecastPoint { date, volatility })
            .collect())
    }

    /// [`predict_points`](Self::predict_points) keyed by ISO date.
    pub fn predict_volatility(&self, horizon: usize) -> Result<BTreeMap<String, f64>, ModelError> {
        Ok(self
            .predict_points(horizon)?
            .into_iter()
            .map(|pt| (pt.date.format("%Y-%m-%d").to_string(), pt.volatility))
            .collect())
    }

    /// Persist the fitted model as a new artifact.
    pub fn dump(&self) -> Result<PathBuf, ModelError> {
        let Stage::Fitted { returns, fit, p, q } = &self.stage else {
            return Err(ModelError::Persist(format!(
                "nothing to save for {}: the model is {}",
                self.ticker,
                self.state()
            )));
        };
        let (Some(first_date), Some(last_date)) = (returns.first_date(), returns.last_date()) else {
            return Err(ModelError::Persist("fitted model has no training dates".into()));
        };

        let artifact = ModelArtifact {
            ticker: self.ticker.clone(),
            p: *p,
            q: *q,
            fitted_at: Utc::now(),
            first_date,
            last_date,
            fit: fit.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&artifact)
            .map_err(|e| ModelError::Persist(format!("artifact encoding failed: {e}")))?;
        Ok(self.artifacts.store(&self.ticker, &bytes)?)
    }

    /// Attach the most recent saved model for this ticker.
    pub fn load(&mut self) -> Result<PathBuf, ModelError> {
        if !matches!(self.stage, Stage::Empty) {
            return Err(self.invalid("load a model"));
        }

        let (path, bytes) = self.artifacts.latest(&self.ticker)?;
        let artifact: ModelArtifact = serde_json::from_slice(&bytes).map_err(|e| {
            ModelError::Persist(format!("artifact {} is unreadable: {e}", path.display()))
        })?;
        let fit = &artifact.fit;
        if fit.params.q() != artifact.q
            || fit.params.p() != artifact.p
            || fit.tail_resid_sq.len() != artifact.q
            || fit.tail_variance.len() != artifact.p
        {
            return Err(ModelError::Persist(format!(
                "artifact {} does not describe a GARCH({},{}) fit",
                path.display(),
                artifact.p,
                artifact.q
            )));
        }
        if artifact.ticker != self.ticker {
            return Err(ModelError::Persist(format!(
                "artifact {} belongs to {}, not {}",
                path.display(),
                artifact.ticker,
                self.ticker
            )));
        }

        info!(
            "{}: loaded GARCH({},{}) fitted {} on data through {}",
            self.ticker, artifact.p, artifact.q, artifact.fitted_at, artifact.last_date
        );
        self.stage = Stage::LoadedFromDisk { artifact };
        Ok(path)
    }

    pub fn fit_summary(&self) -> Option<&GarchFit> {
        match &self.stage {
            Stage::Fitted { fit, .. } => Some(fit),
            Stage::LoadedFromDisk { artifact, .. } => Some(&artifact.fit),
            _ => None,
        }
    }

    pub fn aic(&self) -> Option<f64> {
        self.fit_summary().map(|f| f.aic)
    }

    pub fn bic(&self) -> Option<f64> {
        self.fit_summary().map(|f| f.bic)
    }

    pub fn returns(&self) -> Option<&ReturnSeries> {
        match &self.stage {
            Stage::DataLoaded { returns } | Stage::Fitted { returns, .. } => Some(returns),
            _ => None,
        }
    }

    fn invalid(&self, operation: &'static str) -> ModelError {
        ModelError::InvalidState { operation, state: self.state().as_str() }
    }
}
