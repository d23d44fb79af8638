use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use harvest_config::{ExtractionRequest, StorageMode};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::AppState;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Serialize)]
pub struct RootResponse {
  pub message: &'static str,
  pub status: &'static str,
}

pub async fn root() -> Json<RootResponse> {
  Json(RootResponse {
    message: "Document extraction API is running",
    status: "healthy",
  })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
  pub status: &'static str,
  pub gemini_configured: bool,
  pub aws_configured: bool,
  pub storage_mode: StorageMode,
}

/// Reports which credentials are present, never their values.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
  let config = state.orchestrator.config();
  Json(HealthResponse {
    status: "healthy",
    gemini_configured: config.credentials.llm,
    aws_configured: config.credentials.storage,
    storage_mode: config.storage.mode,
  })
}

#[derive(Debug, Deserialize)]
pub struct ExtractBody {
  pub url: String,
  pub s3_bucket: String,
  pub s3_prefix: String,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
  pub status: &'static str,
  pub files: Vec<String>,
  pub message: String,
}

/// Run one extraction and report the stored references.
///
/// "No documents found" is a normal outcome: it answers 200 with status
/// `failed` and the collected diagnostics.
pub async fn extract(
  State(state): State<AppState>,
  body: Result<Json<ExtractBody>, JsonRejection>,
) -> ApiResult<Json<ExtractResponse>> {
  let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
  if body.s3_prefix.trim().is_empty() {
    return Err(ApiError::bad_request("s3_prefix must not be empty"));
  }
  let request = ExtractionRequest::new(&body.url, body.s3_bucket, body.s3_prefix)?;
  let config = state.orchestrator.config();
  request.authorize(&config.allowed_hosts)?;
  config.require_credentials()?;

  let report = state
    .orchestrator
    .run(&request, state.shutdown.child_token())
    .await
    .map_err(|e| {
      warn!(url = %request.source_url, error = %e, "extraction aborted");
      ApiError::from(e)
    })?;

  info!(
    request_id = %report.request_id,
    url = %request.source_url,
    files = report.files.len(),
    "extraction request served"
  );
  Ok(Json(ExtractResponse {
    status: if report.is_success() { "success" } else { "failed" },
    files: report.uris(),
    message: report.message(),
  }))
}
