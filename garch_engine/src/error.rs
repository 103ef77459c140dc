/// error.rs — Error taxonomy of the fit / predict pipeline
///
/// Each layer owns a narrow error enum (StoreError, FetchError,
/// ArtifactError, EstimatorError). They converge here into ModelError,
/// whose `kind()` is what the HTTP envelope reports.
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::artifacts::ArtifactError;
use crate::fetcher::FetchError;
use crate::models::estimator::EstimatorError;
use crate::models::TickerError;
use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DataError,
    FitError,
    PredictError,
    PersistError,
    NotFound,
    StorageError,
    InvalidState,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DataError => "data_error",
            ErrorKind::FitError => "fit_error",
            ErrorKind::PredictError => "predict_error",
            ErrorKind::PersistError => "persist_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::StorageError => "storage_error",
            ErrorKind::InvalidState => "invalid_state",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    /// Bad ticker, failed fetch, or no stored history
    #[error("{0}")]
    Data(String),
    /// Optimizer failure, empty/short input, or fit called out of order
    #[error("{0}")]
    Fit(String),
    /// Invalid horizon or no model attached
    #[error("{0}")]
    Predict(String),
    /// Artifact write/read/decode failure
    #[error("{0}")]
    Persist(String),
    /// No artifact to load
    #[error("{0}")]
    NotFound(String),
    /// Price store write failure
    #[error("{0}")]
    Storage(String),
    #[error("cannot {operation} while the model is {state}")]
    InvalidState { operation: &'static str, state: &'static str },
}

impl ModelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelError::Data(_) => ErrorKind::DataError,
            ModelError::Fit(_) => ErrorKind::FitError,
            ModelError::Predict(_) => ErrorKind::PredictError,
            ModelError::Persist(_) => ErrorKind::PersistError,
            ModelError::NotFound(_) => ErrorKind::NotFound,
            ModelError::Storage(_) => ErrorKind::StorageError,
            ModelError::InvalidState { .. } => ErrorKind::InvalidState,
        }
    }
}

impl From<TickerError> for ModelError {
    fn from(e: TickerError) -> Self {
        ModelError::Data(e.to_string())
    }
}

impl From<FetchError> for ModelError {
    fn from(e: FetchError) -> Self {
        ModelError::Data(e.to_string())
    }
}

impl From<StoreError> for ModelError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => ModelError::Data(e.to_string()),
            other => ModelError::Storage(other.to_string()),
        }
    }
}

impl From<ArtifactError> for ModelError {
    fn from(e: ArtifactError) -> Self {
        match e {
            ArtifactError::NotFound(_) => ModelError::NotFound(e.to_string()),
            other => ModelError::Persist(other.to_string()),
        }
    }
}

impl From<EstimatorError> for ModelError {
    fn from(e: EstimatorError) -> Self {
        ModelError::Fit(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Ticker;

    #[test]
    fn store_not_found_is_a_data_error() {
        let ticker = Ticker::parse("ZZZ").unwrap();
        let err: ModelError = StoreError::NotFound(ticker).into();
        assert_eq!(err.kind(), ErrorKind::DataError);
        assert!(err.to_string().contains("ZZZ"));
    }

    #[test]
    fn missing_artifact_is_not_found() {
        let ticker = Ticker::parse("ZZZ").unwrap();
        let err: ModelError = ArtifactError::NotFound(ticker).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "No model trained for ZZZ");
    }

    #[test]
    fn kinds_serialise_snake_case() {
        let json = serde_json::to_string(&ErrorKind::PredictError).unwrap();
        assert_eq!(json, "\"predict_error\"");
        assert_eq!(ErrorKind::PredictError.as_str(), "predict_error");
    }
}
