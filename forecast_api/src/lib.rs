/// lib.rs — Forecast API
///
/// HTTP surface (axum) and CLI over the garch_engine fit / predict
/// pipeline.
pub mod api;
pub mod cli;
pub mod handlers;
pub mod schemas;
pub mod service;

pub use api::{create_router, serve};
pub use service::ApiState;
