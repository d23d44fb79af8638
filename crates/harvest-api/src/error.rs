use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use harvest_config::ConfigError;
use harvest_orchestrator::OrchestratorError;
use serde::Serialize;
use thiserror::Error;

/// JSON error body.
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorBody {
  pub code: &'static str,
  pub message: String,
}

#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
  pub status: StatusCode,
  pub code: &'static str,
  pub message: String,
}

impl ApiError {
  pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
    Self {
      status,
      code,
      message: message.into(),
    }
  }

  pub fn bad_request(message: impl Into<String>) -> Self {
    Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
  }

  pub fn forbidden_host(message: impl Into<String>) -> Self {
    Self::new(StatusCode::BAD_REQUEST, "host_not_allowed", message)
  }

  pub fn configuration(message: impl Into<String>) -> Self {
    Self::new(StatusCode::INTERNAL_SERVER_ERROR, "configuration", message)
  }

  pub fn internal(message: impl Into<String>) -> Self {
    Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
  }
}

impl From<ConfigError> for ApiError {
  fn from(e: ConfigError) -> Self {
    match e {
      ConfigError::DisallowedHost { .. } => ApiError::forbidden_host(e.to_string()),
      ConfigError::InvalidUrl { .. } | ConfigError::InvalidRequest { .. } => {
        ApiError::bad_request(e.to_string())
      }
      _ => ApiError::configuration(e.to_string()),
    }
  }
}

impl From<OrchestratorError> for ApiError {
  fn from(e: OrchestratorError) -> Self {
    match e {
      OrchestratorError::Config(e) => e.into(),
      OrchestratorError::Profile(_) => ApiError::configuration(e.to_string()),
      OrchestratorError::WorkDir(_) | OrchestratorError::Cancelled => ApiError::internal(e.to_string()),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let body = ApiErrorBody {
      code: self.code,
      message: self.message,
    };
    (self.status, Json(body)).into_response()
  }
}

pub type ApiResult<T> = Result<T, ApiError>;
