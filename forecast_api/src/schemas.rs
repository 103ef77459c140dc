/// schemas.rs — Request and response bodies
///
/// Responses echo the request fields and add an outcome. Pipeline failures
/// are reported in-band (`success: false`), never through the status code.
use garch_engine::{ErrorKind, ModelError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitIn {
    pub ticker:         String,
    pub use_new_data:   bool,
    pub n_observations: i64,
    pub p:              i64,
    pub q:              i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FitOut {
    #[serde(flatten)]
    pub request:    FitIn,
    pub success:    bool,
    pub message:    String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl FitOut {
    pub fn ok(request: FitIn, message: String) -> Self {
        Self { request, success: true, message, error_kind: None }
    }

    pub fn failed(request: FitIn, err: &ModelError) -> Self {
        Self {
            request,
            success: false,
            message: err.to_string(),
            error_kind: Some(err.kind()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictIn {
    pub ticker: String,
    pub n_days: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictOut {
    #[serde(flatten)]
    pub request:    PredictIn,
    pub success:    bool,
    /// ISO date → forecast volatility; empty on failure
    pub forecast:   BTreeMap<String, f64>,
    /// Empty on success
    pub message:    String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl PredictOut {
    pub fn ok(request: PredictIn, forecast: BTreeMap<String, f64>) -> Self {
        Self { request, success: true, forecast, message: String::new(), error_kind: None }
    }

    pub fn failed(request: PredictIn, err: &ModelError) -> Self {
        Self {
            request,
            success: false,
            forecast: BTreeMap::new(),
            message: err.to_string(),
            error_kind: Some(err.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fit_out_flattens_request_and_hides_kind_on_success() {
        let req = FitIn {
            ticker: "AAPL".into(),
            use_new_data: false,
            n_observations: 250,
            p: 1,
            q: 1,
        };
        let body = serde_json::to_value(FitOut::ok(req, "done".into())).unwrap();
        assert_eq!(
            body,
            json!({
                "ticker": "AAPL", "use_new_data": false, "n_observations": 250,
                "p": 1, "q": 1, "success": true, "message": "done"
            })
        );
    }

    #[test]
    fn predict_failure_carries_kind_and_empty_forecast() {
        let req = PredictIn { ticker: "ZZZ".into(), n_days: 3 };
        let err = ModelError::NotFound("No model trained for ZZZ".into());
        let body = serde_json::to_value(PredictOut::failed(req, &err)).unwrap();

        assert_eq!(body["success"], json!(false));
        assert_eq!(body["forecast"], json!({}));
        assert_eq!(body["error_kind"], json!("not_found"));
        assert_eq!(body["n_days"], json!(3));
    }
}
