use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use harvest_artifact::MemoryStore;
use harvest_config::{CollectMode, ExtractionRequest, HarvestConfig, RetryPolicy};
use harvest_fetch::{FetchError, FetchedFile, Fetcher};
use harvest_navigator::{ScriptedNavigator, Step};
use harvest_orchestrator::{
  ChannelNotifier, ExtractionEvent, Orchestrator, OrchestratorError, Phase, Strategy,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

const PAGE: &str = "https://caleprocure.ca.gov/event/0850/0000036230";
const PDF: &[u8] = b"%PDF-1.7\n1 0 obj\n<< /Type /Catalog >>\nendobj\n%%EOF\n";
const HTML: &[u8] = b"<!DOCTYPE html><html><body>Session expired</body></html>";

/// Serves canned bodies by URL; anything else is a 404.
#[derive(Default)]
struct MapFetcher {
  bodies: HashMap<String, Vec<u8>>,
  calls: AtomicUsize,
}

impl MapFetcher {
  fn with(mut self, url: &str, body: &[u8]) -> Self {
    self.bodies.insert(url.to_string(), body.to_vec());
    self
  }

  fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Fetcher for MapFetcher {
  async fn fetch_and_stage(
    &self,
    url: &Url,
    destination: &Path,
    filename_hint: Option<&str>,
  ) -> Result<FetchedFile, FetchError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    let Some(body) = self.bodies.get(url.as_str()) else {
      return Err(FetchError::Status {
        url: url.to_string(),
        status: 404,
      });
    };
    let name = filename_hint
      .map(String::from)
      .or_else(|| url.path_segments().and_then(|mut s| s.next_back()).map(String::from))
      .unwrap_or_else(|| "download.pdf".to_string());
    let path = destination.join(name);
    tokio::fs::write(&path, body).await?;
    Ok(FetchedFile {
      url: url.clone(),
      path,
      content_type: None,
      len: body.len() as u64,
    })
  }
}

fn test_config(data_dir: &Path) -> HarvestConfig {
  let mut config = HarvestConfig::with_data_dir(data_dir);
  config.navigation.retry = RetryPolicy::fixed(3, Duration::from_millis(5));
  config.navigation.timeout = Duration::from_secs(5);
  config.watch.timeout = Duration::from_millis(300);
  config.watch.poll_interval = Duration::from_millis(10);
  config.watch.settle_interval = Duration::from_millis(20);
  config
}

fn request() -> ExtractionRequest {
  ExtractionRequest::new(PAGE, "bucket1", "rfp/0000036230").unwrap()
}

struct Harness {
  orchestrator: Orchestrator<ChannelNotifier>,
  navigator: Arc<ScriptedNavigator>,
  fetcher: Arc<MapFetcher>,
  store: Arc<MemoryStore>,
  events: mpsc::UnboundedReceiver<ExtractionEvent>,
}

fn harness(config: HarvestConfig, steps: Vec<Step>, fetcher: MapFetcher) -> Harness {
  harness_with_store(config, steps, fetcher, MemoryStore::new())
}

fn harness_with_store(
  config: HarvestConfig,
  steps: Vec<Step>,
  fetcher: MapFetcher,
  store: MemoryStore,
) -> Harness {
  let navigator = Arc::new(ScriptedNavigator::new(steps));
  let fetcher = Arc::new(fetcher);
  let store = Arc::new(store);
  let (tx, events) = mpsc::unbounded_channel();
  let orchestrator = Orchestrator::with_notifier(
    config,
    navigator.clone(),
    fetcher.clone(),
    store.clone(),
    ChannelNotifier::new(tx),
  );
  Harness {
    orchestrator,
    navigator,
    fetcher,
    store,
    events,
  }
}

fn drain(events: &mut mpsc::UnboundedReceiver<ExtractionEvent>) -> Vec<ExtractionEvent> {
  let mut out = Vec::new();
  while let Ok(event) = events.try_recv() {
    out.push(event);
  }
  out
}

fn started_strategies(events: &[ExtractionEvent]) -> Vec<Strategy> {
  events
    .iter()
    .filter_map(|e| match e {
      ExtractionEvent::StrategyStarted { strategy, .. } => Some(*strategy),
      _ => None,
    })
    .collect()
}

fn work_dir_is_empty(config_dir: &Path) -> bool {
  match std::fs::read_dir(config_dir) {
    Ok(mut entries) => entries.next().is_none(),
    Err(_) => true,
  }
}

#[tokio::test]
async fn test_direct_link_short_circuits_later_strategies() {
  let data = tempfile::tempdir().unwrap();
  let config = test_config(data.path());
  let work_dir = config.work_dir.clone();
  let reply = "Found the solicitation: https://caleprocure.ca.gov/docs/Solicitation_0000036230.pdf \
               and a form at /PSRelay/attachments/Addendum_1.pdf";
  let fetcher = MapFetcher::default()
    .with("https://caleprocure.ca.gov/docs/Solicitation_0000036230.pdf", PDF)
    .with("https://caleprocure.ca.gov/PSRelay/attachments/Addendum_1.pdf", PDF);
  let mut h = harness(config, vec![Step::text(reply)], fetcher);

  let report = h.orchestrator.run(&request(), CancellationToken::new()).await.unwrap();

  assert_eq!(report.uris(), vec!["s3://bucket1/rfp/0000036230/Solicitation_0000036230.pdf"]);
  assert_eq!(report.strategy, Some(Strategy::Direct));
  assert_eq!(report.outcome, Phase::Uploaded);
  assert_eq!(h.store.put_count(), 1);
  assert_eq!(h.fetcher.calls(), 1);
  assert_eq!(h.navigator.calls(), 1);

  let object = h
    .store
    .object("bucket1", "rfp/0000036230/Solicitation_0000036230.pdf")
    .unwrap();
  assert_eq!(object.bytes.as_ref(), PDF);
  assert_eq!(object.content_type, "application/pdf");

  let events = drain(&mut h.events);
  assert_eq!(started_strategies(&events), vec![Strategy::Direct]);
  assert!(matches!(events.last(), Some(ExtractionEvent::ExtractionCompleted { files: 1, .. })));
  assert!(work_dir_is_empty(&work_dir));
}

#[tokio::test]
async fn test_everything_fails_returns_empty_and_purges() {
  let data = tempfile::tempdir().unwrap();
  let config = test_config(data.path());
  let work_dir = config.work_dir.clone();
  let reply = "Download: https://caleprocure.ca.gov/docs/Solicitation.pdf";
  let fetcher = MapFetcher::default().with("https://caleprocure.ca.gov/docs/Solicitation.pdf", HTML);
  let mut h = harness(
    config,
    vec![Step::Reply {
      text: reply.to_string(),
      files: vec![("partial.pdf.crdownload".to_string(), b"%PDF-1.7".to_vec())],
    }],
    fetcher,
  );

  let report = h.orchestrator.run(&request(), CancellationToken::new()).await.unwrap();

  assert!(report.files.is_empty());
  assert!(!report.is_success());
  assert_eq!(report.strategy, None);
  assert_eq!(report.outcome, Phase::Exhausted);
  assert_eq!(h.store.put_count(), 0);
  assert!(report.diagnostics.iter().any(|d| d.contains("not a pdf")));
  assert!(report.message().starts_with("No documents found"));

  let events = drain(&mut h.events);
  assert_eq!(
    started_strategies(&events),
    vec![Strategy::Direct, Strategy::Script, Strategy::Constructed, Strategy::Watch]
  );
  assert!(events.iter().any(|e| matches!(e, ExtractionEvent::Purged { .. })));
  assert!(work_dir_is_empty(&work_dir));
}

#[tokio::test]
async fn test_watch_fallback_uploads_collaborator_download() {
  let data = tempfile::tempdir().unwrap();
  let config = test_config(data.path());
  let mut h = harness(
    config,
    vec![Step::Reply {
      text: "I clicked the attachment and it downloaded.".to_string(),
      files: vec![("Event_0000036230.pdf".to_string(), PDF.to_vec())],
    }],
    MapFetcher::default(),
  );

  let report = h.orchestrator.run(&request(), CancellationToken::new()).await.unwrap();

  assert_eq!(report.uris(), vec!["s3://bucket1/rfp/0000036230/Event_0000036230.pdf"]);
  assert_eq!(report.strategy, Some(Strategy::Watch));
  assert_eq!(h.store.put_count(), 1);

  let events = drain(&mut h.events);
  assert!(events.iter().any(|e| matches!(
    e,
    ExtractionEvent::DocumentStored { strategy: Strategy::Watch, .. }
  )));
}

#[tokio::test]
async fn test_invalid_download_is_not_uploaded() {
  let data = tempfile::tempdir().unwrap();
  let config = test_config(data.path());
  let mut h = harness(
    config,
    vec![Step::download("error.pdf", HTML)],
    MapFetcher::default(),
  );

  let report = h.orchestrator.run(&request(), CancellationToken::new()).await.unwrap();

  assert!(report.files.is_empty());
  assert_eq!(h.store.put_count(), 0);
  let events = drain(&mut h.events);
  assert!(events.iter().any(|e| matches!(
    e,
    ExtractionEvent::CandidateRejected { strategy: Strategy::Watch, .. }
  )));
}

#[tokio::test]
async fn test_tier_mode_stores_every_valid_candidate() {
  let data = tempfile::tempdir().unwrap();
  let mut config = test_config(data.path());
  config.collect = CollectMode::Tier;
  let reply = "https://caleprocure.ca.gov/docs/a.pdf https://caleprocure.ca.gov/docs/b.pdf \
               https://caleprocure.ca.gov/docs/broken.pdf";
  let fetcher = MapFetcher::default()
    .with("https://caleprocure.ca.gov/docs/a.pdf", PDF)
    .with("https://caleprocure.ca.gov/docs/b.pdf", PDF)
    .with("https://caleprocure.ca.gov/docs/broken.pdf", HTML);
  let h = harness(config, vec![Step::text(reply)], fetcher);

  let report = h.orchestrator.run(&request(), CancellationToken::new()).await.unwrap();

  assert_eq!(
    report.uris(),
    vec![
      "s3://bucket1/rfp/0000036230/a.pdf",
      "s3://bucket1/rfp/0000036230/b.pdf",
    ]
  );
  assert_eq!(h.fetcher.calls(), 3);
  assert_eq!(report.diagnostics.len(), 1);
}

#[tokio::test]
async fn test_navigator_retries_then_continues() {
  let data = tempfile::tempdir().unwrap();
  let config = test_config(data.path());
  let fetcher = MapFetcher::default().with("https://caleprocure.ca.gov/docs/a.pdf", PDF);
  let mut h = harness(
    config,
    vec![
      Step::Fail("browser crashed".to_string()),
      Step::text("https://caleprocure.ca.gov/docs/a.pdf"),
    ],
    fetcher,
  );

  let report = h.orchestrator.run(&request(), CancellationToken::new()).await.unwrap();

  assert_eq!(h.navigator.calls(), 2);
  assert_eq!(report.files.len(), 1);
  let attempts = drain(&mut h.events)
    .into_iter()
    .filter(|e| matches!(e, ExtractionEvent::NavigatorAttempt { .. }))
    .count();
  assert_eq!(attempts, 2);
}

#[tokio::test]
async fn test_navigator_exhaustion_is_a_diagnostic() {
  let data = tempfile::tempdir().unwrap();
  let config = test_config(data.path());
  let h = harness(
    config,
    vec![
      Step::Fail("one".to_string()),
      Step::Fail("two".to_string()),
      Step::Fail("three".to_string()),
    ],
    MapFetcher::default(),
  );

  let report = h.orchestrator.run(&request(), CancellationToken::new()).await.unwrap();

  assert_eq!(h.navigator.calls(), 3);
  assert!(report.files.is_empty());
  assert!(report.diagnostics[0].starts_with("navigator failed"));
}

#[tokio::test]
async fn test_disallowed_host_never_starts() {
  let data = tempfile::tempdir().unwrap();
  let config = test_config(data.path());
  let work_dir = config.work_dir.clone();
  let mut h = harness(config, vec![], MapFetcher::default());
  let request = ExtractionRequest::new("https://example.com/rfp", "bucket1", "x").unwrap();

  let err = h.orchestrator.run(&request, CancellationToken::new()).await.unwrap_err();

  assert!(matches!(err, OrchestratorError::Config(_)));
  assert_eq!(h.navigator.calls(), 0);
  assert!(drain(&mut h.events).is_empty());
  assert!(!work_dir.exists());
}

#[tokio::test]
async fn test_cancelled_run_still_purges() {
  let data = tempfile::tempdir().unwrap();
  let config = test_config(data.path());
  let work_dir = config.work_dir.clone();
  let h = harness(config, vec![Step::text("nothing here")], MapFetcher::default());
  let cancel = CancellationToken::new();
  cancel.cancel();

  let err = h.orchestrator.run(&request(), cancel).await.unwrap_err();

  assert!(matches!(err, OrchestratorError::Cancelled));
  assert!(work_dir_is_empty(&work_dir));
}

#[tokio::test]
async fn test_failed_upload_moves_on_to_next_candidate() {
  let data = tempfile::tempdir().unwrap();
  let config = test_config(data.path());
  let reply = "https://caleprocure.ca.gov/x/doc.pdf and https://caleprocure.ca.gov/y/doc.pdf";
  let fetcher = MapFetcher::default()
    .with("https://caleprocure.ca.gov/x/doc.pdf", b"%PDF-1.4 first")
    .with("https://caleprocure.ca.gov/y/doc.pdf", b"%PDF-1.4 second");
  let h = harness_with_store(config, vec![Step::text(reply)], fetcher, MemoryStore::failing(1));

  let report = h.orchestrator.run(&request(), CancellationToken::new()).await.unwrap();

  assert_eq!(report.uris(), vec!["s3://bucket1/rfp/0000036230/doc.pdf"]);
  assert_eq!(report.strategy, Some(Strategy::Direct));
  assert_eq!(h.fetcher.calls(), 2);
  assert_eq!(h.store.put_count(), 2);
  assert!(report.diagnostics.iter().any(|d| d.contains("upload failed")));

  let object = h.store.object("bucket1", "rfp/0000036230/doc.pdf").unwrap();
  assert_eq!(object.bytes.as_ref(), b"%PDF-1.4 second");
}

#[tokio::test]
async fn test_same_name_documents_last_write_wins() {
  let data = tempfile::tempdir().unwrap();
  let mut config = test_config(data.path());
  config.collect = CollectMode::Tier;
  let reply = "https://caleprocure.ca.gov/x/doc.pdf https://caleprocure.ca.gov/y/doc.pdf";
  let fetcher = MapFetcher::default()
    .with("https://caleprocure.ca.gov/x/doc.pdf", b"%PDF-first")
    .with("https://caleprocure.ca.gov/y/doc.pdf", b"%PDF-second");
  let h = harness(config, vec![Step::text(reply)], fetcher);

  let report = h.orchestrator.run(&request(), CancellationToken::new()).await.unwrap();

  assert_eq!(h.fetcher.calls(), 2);
  assert_eq!(h.store.put_count(), 2);
  assert_eq!(report.uris(), vec!["s3://bucket1/rfp/0000036230/doc.pdf"]);
  let object = h.store.object("bucket1", "rfp/0000036230/doc.pdf").unwrap();
  assert_eq!(object.bytes.as_ref(), b"%PDF-second");
}

#[tokio::test]
async fn test_leftover_request_directories_are_swept() {
  let data = tempfile::tempdir().unwrap();
  let config = test_config(data.path());
  let work_dir = config.work_dir.clone();
  let leftover = work_dir.join("old-id");
  std::fs::create_dir_all(&leftover).unwrap();
  std::fs::write(leftover.join("a.pdf"), PDF).unwrap();

  let fetcher = MapFetcher::default().with("https://caleprocure.ca.gov/docs/a.pdf", PDF);
  let h = harness(
    config,
    vec![Step::text("https://caleprocure.ca.gov/docs/a.pdf")],
    fetcher,
  );

  let report = h.orchestrator.run(&request(), CancellationToken::new()).await.unwrap();

  assert_eq!(report.files.len(), 1);
  assert!(!leftover.exists());
  assert!(work_dir_is_empty(&work_dir));
}
