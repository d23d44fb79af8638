//! Harvest API
//!
//! HTTP surface over the extraction orchestrator:
//! - `GET /` liveness
//! - `GET /health` credential presence and storage mode
//! - `POST /extract` run one extraction

mod error;
mod handlers;

pub use error::{ApiError, ApiErrorBody, ApiResult};
pub use handlers::{ExtractBody, ExtractResponse, HealthResponse};

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use harvest_orchestrator::Orchestrator;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct AppState {
  pub orchestrator: Arc<Orchestrator>,
  /// Cancelled on shutdown; every request runs under a child token.
  pub shutdown: CancellationToken,
}

impl AppState {
  pub fn new(orchestrator: Orchestrator) -> Self {
    Self {
      orchestrator: Arc::new(orchestrator),
      shutdown: CancellationToken::new(),
    }
  }
}

pub fn build_router(state: AppState) -> Router {
  Router::new()
    .route("/", get(handlers::root))
    .route("/health", get(handlers::health))
    .route("/extract", post(handlers::extract))
    .layer(CorsLayer::permissive())
    .with_state(state)
}
