use axum::{extract::State, response::Json};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::schemas::{FitIn, FitOut, PredictIn, PredictOut};
use crate::service::{self, ApiState};

/// Liveness check
pub async fn hello() -> Json<Value> {
    Json(json!({ "message": "Hello World!" }))
}

pub async fn fit(State(state): State<ApiState>, Json(req): Json<FitIn>) -> Json<FitOut> {
    info!(
        "POST /fit ticker={} use_new_data={} n_observations={} p={} q={}",
        req.ticker, req.use_new_data, req.n_observations, req.p, req.q
    );
    let outcome = service::fit(
        &state,
        &req.ticker,
        req.use_new_data,
        req.n_observations,
        req.p,
        req.q,
    )
    .await;

    match outcome {
        Ok(report) => Json(FitOut::ok(req, report.message())),
        Err(e) => {
            warn!("Fit failed for {} [{}]: {}", req.ticker, e.kind(), e);
            Json(FitOut::failed(req, &e))
        }
    }
}

pub async fn predict(State(state): State<ApiState>, Json(req): Json<PredictIn>) -> Json<PredictOut> {
    info!("POST /predict ticker={} n_days={}", req.ticker, req.n_days);

    match service::predict(&state, &req.ticker, req.n_days).await {
        Ok(forecast) => Json(PredictOut::ok(req, forecast)),
        Err(e) => {
            warn!("Predict failed for {} [{}]: {}", req.ticker, e.kind(), e);
            Json(PredictOut::failed(req, &e))
        }
    }
}
