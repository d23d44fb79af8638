use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use harvest_api::{AppState, build_router};
use harvest_artifact::MemoryStore;
use harvest_config::{HarvestConfig, ProfileSet, RetryPolicy, StorageMode};
use harvest_fetch::{FetchError, FetchedFile, Fetcher};
use harvest_navigator::{ScriptedNavigator, Step};
use harvest_orchestrator::Orchestrator;
use serde_json::{Value, json};
use tower::util::ServiceExt;
use url::Url;

const PDF: &[u8] = b"%PDF-1.4\n%%EOF\n";

struct Offline;

#[async_trait]
impl Fetcher for Offline {
  async fn fetch_and_stage(
    &self,
    url: &Url,
    _destination: &Path,
    _filename_hint: Option<&str>,
  ) -> Result<FetchedFile, FetchError> {
    Err(FetchError::Connect {
      url: url.to_string(),
      message: "offline".to_string(),
    })
  }
}

fn app(data_dir: &Path, steps: Vec<Step>, store: Arc<MemoryStore>) -> axum::Router {
  let mut config = HarvestConfig::with_data_dir(data_dir);
  config.storage.mode = StorageMode::Fs;
  config.profiles = ProfileSet::new(vec![]);
  config.navigation.retry = RetryPolicy::once();
  config.watch.timeout = Duration::from_millis(300);
  config.watch.poll_interval = Duration::from_millis(10);
  config.watch.settle_interval = Duration::from_millis(20);

  let orchestrator = Orchestrator::new(
    config,
    Arc::new(ScriptedNavigator::new(steps)),
    Arc::new(Offline),
    store,
  );
  build_router(AppState::new(orchestrator))
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
  let res = app.oneshot(request).await.unwrap();
  let status = res.status();
  let body = axum::body::to_bytes(res.into_body(), 64 * 1024).await.unwrap();
  (status, serde_json::from_slice(&body).unwrap())
}

fn post_extract(body: Value) -> Request<Body> {
  Request::builder()
    .method("POST")
    .uri("/extract")
    .header("content-type", "application/json")
    .body(Body::from(body.to_string()))
    .unwrap()
}

#[tokio::test]
async fn test_root_and_health() {
  let data = tempfile::tempdir().unwrap();
  let store = Arc::new(MemoryStore::new());

  let (status, body) = send(
    app(data.path(), vec![], store.clone()),
    Request::builder().uri("/").body(Body::empty()).unwrap(),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "healthy");

  let (status, body) = send(
    app(data.path(), vec![], store),
    Request::builder().uri("/health").body(Body::empty()).unwrap(),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(
    body,
    json!({
      "status": "healthy",
      "gemini_configured": false,
      "aws_configured": false,
      "storage_mode": "fs",
    })
  );
}

#[tokio::test]
async fn test_extract_success() {
  let data = tempfile::tempdir().unwrap();
  let store = Arc::new(MemoryStore::new());
  let app = app(
    data.path(),
    vec![Step::download("Solicitation.pdf", PDF)],
    store.clone(),
  );

  let (status, body) = send(
    app,
    post_extract(json!({
      "url": "https://caleprocure.ca.gov/event/0850/0000036230",
      "s3_bucket": "bucket1",
      "s3_prefix": "rfp/36230",
    })),
  )
  .await;

  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "success");
  assert_eq!(body["files"], json!(["s3://bucket1/rfp/36230/Solicitation.pdf"]));
  assert_eq!(body["message"], "Successfully extracted 1 documents");
  assert_eq!(store.put_count(), 1);
}

#[tokio::test]
async fn test_extract_nothing_found_is_not_an_error() {
  let data = tempfile::tempdir().unwrap();
  let store = Arc::new(MemoryStore::new());
  let app = app(data.path(), vec![Step::text("no attachments")], store);

  let (status, body) = send(
    app,
    post_extract(json!({
      "url": "https://caleprocure.ca.gov/event/0850/0000036230",
      "s3_bucket": "bucket1",
      "s3_prefix": "rfp",
    })),
  )
  .await;

  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "failed");
  assert_eq!(body["files"], json!([]));
  assert!(body["message"].as_str().unwrap().starts_with("No documents found"));
}

#[tokio::test]
async fn test_extract_rejects_bad_requests() {
  let data = tempfile::tempdir().unwrap();
  let store = Arc::new(MemoryStore::new());

  let cases = [
    json!({"url": "https://example.com/rfp", "s3_bucket": "b", "s3_prefix": "p"}),
    json!({"url": "ftp://caleprocure.ca.gov/x", "s3_bucket": "b", "s3_prefix": "p"}),
    json!({"url": "https://caleprocure.ca.gov/x", "s3_bucket": "", "s3_prefix": "p"}),
    json!({"url": "https://caleprocure.ca.gov/x", "s3_bucket": "b", "s3_prefix": ""}),
    json!({"url": "https://caleprocure.ca.gov/x"}),
  ];
  for case in cases {
    let (status, body) = send(app(data.path(), vec![], store.clone()), post_extract(case.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "case {}", case);
    assert!(body["message"].is_string());
  }
  assert_eq!(store.put_count(), 0);
}

#[tokio::test]
async fn test_missing_storage_credentials_is_a_server_error() {
  let data = tempfile::tempdir().unwrap();
  let mut config = HarvestConfig::with_data_dir(data.path());
  config.storage.mode = StorageMode::S3;
  let orchestrator = Orchestrator::new(
    config,
    Arc::new(ScriptedNavigator::new(vec![])),
    Arc::new(Offline),
    Arc::new(MemoryStore::new()),
  );

  let (status, body) = send(
    build_router(AppState::new(orchestrator)),
    post_extract(json!({
      "url": "https://caleprocure.ca.gov/event/0850/0000036230",
      "s3_bucket": "bucket1",
      "s3_prefix": "rfp",
    })),
  )
  .await;

  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert_eq!(body["code"], "configuration");
}

#[tokio::test]
async fn test_disallowed_host_is_rejected_before_credentials() {
  let data = tempfile::tempdir().unwrap();
  let mut config = HarvestConfig::with_data_dir(data.path());
  config.storage.mode = StorageMode::S3;
  let orchestrator = Orchestrator::new(
    config,
    Arc::new(ScriptedNavigator::new(vec![])),
    Arc::new(Offline),
    Arc::new(MemoryStore::new()),
  );

  let (status, body) = send(
    build_router(AppState::new(orchestrator)),
    post_extract(json!({
      "url": "https://example.com/rfp",
      "s3_bucket": "bucket1",
      "s3_prefix": "rfp",
    })),
  )
  .await;

  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["code"], "host_not_allowed");
}
