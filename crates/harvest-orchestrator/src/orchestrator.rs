//! Extraction state machine.
//!
//! One request runs strictly sequentially: trigger the collaborator once, then
//! try each acquisition strategy in order until one stores a document. Failures
//! below the request level (a bad candidate, a broken upload, a stalled
//! collaborator) are absorbed into diagnostics so the next option still runs.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use harvest_artifact::{Store, StoredReference, upload};
use harvest_config::{CollectMode, ExtractionRequest, HarvestConfig, MAX_NAVIGATION_ATTEMPTS};
use harvest_extract::{CandidateReference, classify, extract_candidates, normalize_url};
use harvest_fetch::Fetcher;
use harvest_navigator::{NavigationOutcome, Navigator, NavigatorError, render_instructions};
use harvest_watch::{DownloadWatcher, WatchOptions, WorkDir};
use tokio::io::AsyncReadExt;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::OrchestratorError;
use crate::events::{ExtractionEvent, ExtractionNotifier, NoopNotifier};
use crate::report::{ExtractionReport, Phase, Strategy};

/// Bytes read from a candidate for signature validation.
const HEADER_LEN: u64 = 8;

/// Drives extraction requests through navigation, acquisition and upload.
///
/// Generic over `N: ExtractionNotifier` so callers can observe progress. Use
/// `Orchestrator::new()` to discard events.
pub struct Orchestrator<N: ExtractionNotifier = NoopNotifier> {
  config: HarvestConfig,
  navigator: Arc<dyn Navigator>,
  fetcher: Arc<dyn Fetcher>,
  store: Arc<dyn Store>,
  notifier: N,
  /// Set once leftovers of earlier processes were removed from the work root.
  swept: OnceCell<()>,
}

impl Orchestrator<NoopNotifier> {
  pub fn new(
    config: HarvestConfig,
    navigator: Arc<dyn Navigator>,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn Store>,
  ) -> Self {
    Self::with_notifier(config, navigator, fetcher, store, NoopNotifier)
  }
}

/// Mutable state of one request.
struct Collected {
  request_id: String,
  files: Vec<StoredReference>,
  /// Artifacts already handed to the store, by normalized source URL or
  /// watched path.
  uploaded: HashSet<String>,
  /// Normalized URLs already fetched.
  tried: HashSet<String>,
  /// Staging slots handed out so far.
  slots: usize,
  diagnostics: Vec<String>,
}

impl Collected {
  fn new(request_id: &str) -> Self {
    Self {
      request_id: request_id.to_string(),
      files: Vec::new(),
      uploaded: HashSet::new(),
      tried: HashSet::new(),
      slots: 0,
      diagnostics: Vec::new(),
    }
  }

  fn next_slot(&mut self) -> usize {
    let slot = self.slots;
    self.slots += 1;
    slot
  }
}

impl<N: ExtractionNotifier> Orchestrator<N> {
  pub fn with_notifier(
    config: HarvestConfig,
    navigator: Arc<dyn Navigator>,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn Store>,
    notifier: N,
  ) -> Self {
    Self {
      config,
      navigator,
      fetcher,
      store,
      notifier,
      swept: OnceCell::new(),
    }
  }

  pub fn config(&self) -> &HarvestConfig {
    &self.config
  }

  /// Run one extraction request to completion.
  ///
  /// Returns `Ok` with an empty file list when every strategy came up empty.
  /// `Err` is reserved for requests that never start (disallowed host, broken
  /// profile, unusable working directory) and for cancellation. The working
  /// directory is purged before this returns, whatever the outcome.
  #[instrument(skip_all, fields(url = %request.source_url, bucket = %request.destination_bucket))]
  pub async fn run(
    &self,
    request: &ExtractionRequest,
    cancel: CancellationToken,
  ) -> Result<ExtractionReport, OrchestratorError> {
    let request_id = uuid::Uuid::new_v4().to_string();

    // Nothing touches the filesystem or the network for a disallowed host.
    request.authorize(&self.config.allowed_hosts)?;

    self.sweep_leftovers().await;
    let mut workdir = match WorkDir::open(&self.config.work_dir, &request_id).await {
      Ok(dir) => dir,
      Err(e) => {
        let error = OrchestratorError::WorkDir(e);
        self.notifier.notify(ExtractionEvent::ExtractionFailed {
          request_id,
          error: error.to_string(),
        });
        return Err(error);
      }
    };

    self.notifier.notify(ExtractionEvent::ExtractionStarted {
      request_id: request_id.clone(),
      url: request.source_url.to_string(),
    });
    self.enter(&request_id, Phase::Init);

    let mut collected = Collected::new(&request_id);
    let result = self.execute(request, &workdir, &mut collected, &cancel).await;

    match workdir.purge().await {
      Ok(removed) => self.notifier.notify(ExtractionEvent::Purged {
        request_id: request_id.clone(),
        removed,
      }),
      Err(e) => {
        warn!(path = %workdir.path().display(), error = %e, "failed to purge working directory");
        collected.diagnostics.push(format!("cleanup failed: {}", e));
      }
    }
    self.enter(&request_id, Phase::Purged);

    match result {
      Ok(strategy) => {
        let outcome = if collected.files.is_empty() {
          Phase::Exhausted
        } else {
          Phase::Uploaded
        };
        self.enter(&request_id, Phase::Done);
        self.notifier.notify(ExtractionEvent::ExtractionCompleted {
          request_id: request_id.clone(),
          files: collected.files.len(),
        });
        info!(
          request_id = %request_id,
          files = collected.files.len(),
          strategy = ?strategy,
          "extraction finished"
        );
        Ok(ExtractionReport {
          request_id,
          files: collected.files,
          strategy,
          outcome,
          diagnostics: collected.diagnostics,
        })
      }
      Err(e) => {
        self.notifier.notify(ExtractionEvent::ExtractionFailed {
          request_id,
          error: e.to_string(),
        });
        Err(e)
      }
    }
  }

  /// Trigger the collaborator and walk the strategies. Returns the strategy
  /// that stored documents, if any.
  async fn execute(
    &self,
    request: &ExtractionRequest,
    workdir: &WorkDir,
    collected: &mut Collected,
    cancel: &CancellationToken,
  ) -> Result<Option<Strategy>, OrchestratorError> {
    let profile = self.config.profiles.for_host(request.host());
    let instructions = render_instructions(&profile, &request.source_url, workdir.path())
      .map_err(OrchestratorError::Profile)?;

    self.enter(&collected.request_id, Phase::Triggered);
    let outcome = self.trigger(request, &instructions, workdir, collected, cancel).await?;

    let candidates = extract_candidates(&outcome.text, &request.source_url, &profile);
    debug!(candidates = candidates.len(), files = outcome.files.len(), "collaborator finished");

    for strategy in [Strategy::Direct, Strategy::Script, Strategy::Constructed] {
      if cancel.is_cancelled() {
        return Err(OrchestratorError::Cancelled);
      }
      let tier: Vec<&CandidateReference> = candidates
        .iter()
        .filter(|c| Strategy::for_origin(c.origin) == strategy)
        .collect();
      if self.remote_tier(strategy, &tier, request, workdir, collected).await > 0 {
        self.enter(&collected.request_id, Phase::Uploaded);
        return Ok(Some(strategy));
      }
    }

    if cancel.is_cancelled() {
      return Err(OrchestratorError::Cancelled);
    }
    if self.watch_tier(request, workdir, collected, cancel).await > 0 {
      self.enter(&collected.request_id, Phase::Uploaded);
      return Ok(Some(Strategy::Watch));
    }
    if cancel.is_cancelled() {
      return Err(OrchestratorError::Cancelled);
    }

    self.enter(&collected.request_id, Phase::Exhausted);
    Ok(None)
  }

  /// Invoke the collaborator under the navigation retry policy. A collaborator
  /// that never succeeds yields an empty outcome plus a diagnostic.
  async fn trigger(
    &self,
    request: &ExtractionRequest,
    instructions: &str,
    workdir: &WorkDir,
    collected: &mut Collected,
    cancel: &CancellationToken,
  ) -> Result<NavigationOutcome, OrchestratorError> {
    let mut policy = self.config.navigation.retry.clone();
    policy.max_attempts = policy.attempts().min(MAX_NAVIGATION_ATTEMPTS);
    let timeout = self.config.navigation.timeout;
    let request_id = collected.request_id.as_str();

    let attempts = policy.run("navigate", NavigatorError::is_retryable, |attempt| async move {
      self.notifier.notify(ExtractionEvent::NavigatorAttempt {
        request_id: request_id.to_string(),
        attempt,
      });
      match tokio::time::timeout(
        timeout,
        self.navigator.navigate_and_collect(&request.source_url, instructions, workdir),
      )
      .await
      {
        Ok(result) => result,
        Err(_) => Err(NavigatorError::Stalled {
          timeout_secs: timeout.as_secs(),
        }),
      }
    });

    let result = tokio::select! {
      result = attempts => result,
      _ = cancel.cancelled() => return Err(OrchestratorError::Cancelled),
    };

    match result {
      Ok(outcome) => Ok(outcome),
      Err(e) => {
        warn!(navigator = self.navigator.name(), error = %e, "collaborator failed, continuing without its output");
        self.notifier.notify(ExtractionEvent::NavigatorFailed {
          request_id: request_id.to_string(),
          error: e.to_string(),
        });
        collected.diagnostics.push(format!("navigator failed: {}", e));
        Ok(NavigationOutcome::default())
      }
    }
  }

  /// Fetch, validate and upload one tier of remote candidates.
  async fn remote_tier(
    &self,
    strategy: Strategy,
    tier: &[&CandidateReference],
    request: &ExtractionRequest,
    workdir: &WorkDir,
    collected: &mut Collected,
  ) -> usize {
    self.enter(&collected.request_id, Phase::Strategy(strategy));
    self.notifier.notify(ExtractionEvent::StrategyStarted {
      request_id: collected.request_id.clone(),
      strategy,
      candidates: tier.len(),
    });

    let before = collected.files.len();
    for candidate in tier {
      let Some(url) = candidate.url() else {
        continue;
      };
      let identity = normalize_url(url.as_str());
      if !collected.tried.insert(identity.clone()) {
        debug!(url = %url, "candidate already tried");
        continue;
      }

      let staging = match workdir.staging_slot(collected.next_slot()).await {
        Ok(dir) => dir,
        Err(e) => {
          self.reject(collected, strategy, url.as_str(), format!("staging directory: {}", e));
          break;
        }
      };

      let fetched = match self
        .fetcher
        .fetch_and_stage(url, &staging, candidate.filename_hint.as_deref())
        .await
      {
        Ok(fetched) => fetched,
        Err(e) => {
          self.reject(collected, strategy, url.as_str(), e.to_string());
          continue;
        }
      };

      if self
        .store_artifact(
          strategy,
          &identity,
          &fetched.path,
          fetched.content_type.as_deref(),
          request,
          collected,
        )
        .await
        && self.config.collect == CollectMode::First
      {
        break;
      }
    }

    self.finish_tier(strategy, collected, before)
  }

  /// Wait for collaborator downloads to settle and upload them.
  async fn watch_tier(
    &self,
    request: &ExtractionRequest,
    workdir: &WorkDir,
    collected: &mut Collected,
    cancel: &CancellationToken,
  ) -> usize {
    let strategy = Strategy::Watch;
    self.enter(&collected.request_id, Phase::Strategy(strategy));

    let settings = &self.config.watch;
    let watcher = DownloadWatcher::new(WatchOptions {
      timeout: settings.timeout,
      poll_interval: settings.poll_interval,
      settle_interval: settings.settle_interval,
      ..WatchOptions::default()
    });
    let stable: Vec<CandidateReference> = watcher
      .wait(workdir.path(), cancel)
      .await
      .into_iter()
      .map(CandidateReference::local)
      .collect();

    self.notifier.notify(ExtractionEvent::StrategyStarted {
      request_id: collected.request_id.clone(),
      strategy,
      candidates: stable.len(),
    });

    let before = collected.files.len();
    for candidate in &stable {
      let Some(path) = candidate.path() else {
        continue;
      };
      let identity = path.display().to_string();
      if self
        .store_artifact(strategy, &identity, path, None, request, collected)
        .await
        && self.config.collect == CollectMode::First
      {
        break;
      }
    }

    self.finish_tier(strategy, collected, before)
  }

  /// Validate a local artifact and upload it. Returns whether it was stored.
  ///
  /// `identity` names the artifact independently of where it was staged.
  async fn store_artifact(
    &self,
    strategy: Strategy,
    identity: &str,
    path: &Path,
    content_type: Option<&str>,
    request: &ExtractionRequest,
    collected: &mut Collected,
  ) -> bool {
    let label = path.display().to_string();
    if collected.uploaded.contains(identity) {
      debug!(artifact = identity, path = %label, "artifact already uploaded");
      return false;
    }

    let header = match read_header(path).await {
      Ok(header) => header,
      Err(e) => {
        self.reject(collected, strategy, &label, format!("unreadable: {}", e));
        return false;
      }
    };
    if !classify(content_type, &header).is_acceptable() {
      self.reject(collected, strategy, &label, "not a pdf".to_string());
      return false;
    }

    // One upload attempt per artifact, even if it fails.
    collected.uploaded.insert(identity.to_string());
    match upload(
      self.store.as_ref(),
      path,
      &request.destination_bucket,
      &request.destination_prefix,
    )
    .await
    {
      Ok(reference) => {
        self.notifier.notify(ExtractionEvent::DocumentStored {
          request_id: collected.request_id.clone(),
          strategy,
          reference: reference.uri(),
        });
        // Same key twice means the object was overwritten; report it once.
        if !collected.files.contains(&reference) {
          collected.files.push(reference);
        }
        true
      }
      Err(e) => {
        self.reject(collected, strategy, &label, format!("upload failed: {}", e));
        false
      }
    }
  }

  /// Remove request directories left behind by earlier processes. Runs once
  /// per orchestrator; concurrent first requests wait for it to finish.
  async fn sweep_leftovers(&self) {
    self
      .swept
      .get_or_init(|| async {
        if let Err(e) = WorkDir::sweep(&self.config.work_dir).await {
          warn!(work_dir = %self.config.work_dir.display(), error = %e, "failed to sweep leftover request directories");
        }
      })
      .await;
  }

  fn finish_tier(&self, strategy: Strategy, collected: &Collected, before: usize) -> usize {
    let stored = collected.files.len() - before;
    self.notifier.notify(ExtractionEvent::StrategyFinished {
      request_id: collected.request_id.clone(),
      strategy,
      stored,
    });
    stored
  }

  fn reject(&self, collected: &mut Collected, strategy: Strategy, candidate: &str, reason: String) {
    warn!(strategy = %strategy, candidate, reason = %reason, "candidate rejected");
    self.notifier.notify(ExtractionEvent::CandidateRejected {
      request_id: collected.request_id.clone(),
      strategy,
      candidate: candidate.to_string(),
      reason: reason.clone(),
    });
    collected
      .diagnostics
      .push(format!("{} candidate {}: {}", strategy, candidate, reason));
  }

  fn enter(&self, request_id: &str, phase: Phase) {
    debug!(request_id, phase = ?phase, "phase");
    self.notifier.notify(ExtractionEvent::PhaseChanged {
      request_id: request_id.to_string(),
      phase,
    });
  }
}

async fn read_header(path: &Path) -> std::io::Result<Vec<u8>> {
  let file = tokio::fs::File::open(path).await?;
  let mut header = Vec::with_capacity(HEADER_LEN as usize);
  file.take(HEADER_LEN).read_to_end(&mut header).await?;
  Ok(header)
}
