//! Download-completion detection.
//!
//! Browsers give no signal when a download finishes, so the watcher polls the
//! directory and treats a file as complete once its size has stopped changing:
//!
//! ```text
//! appearing ──> growing ──> stable (same size for >= settle, re-verified)
//!     │            ▲  │
//!     └────────────┘  └── size changed: back to growing
//! ```
//!
//! In-progress names (`.crdownload`, `.part`, ...) are never candidates, and a
//! zero-byte file never becomes stable.

use std::collections::{BTreeSet, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::classify::{Classifier, EntryKind};

/// Lifecycle of a file the watcher is tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
  /// Seen once, no size history yet.
  Appearing,
  /// Size changed between the last two observations.
  Growing,
  /// Size held steady across the settle interval and passed re-verification.
  Stable,
}

/// A local file whose bytes are not yet known to be complete.
#[derive(Debug, Clone)]
pub struct StagedArtifact {
  pub path: PathBuf,
  pub size: u64,
  pub last_size: u64,
  pub first_seen: Instant,
  /// When the current size was first observed.
  pub size_since: Instant,
  /// Consecutive observations with an unchanged size.
  pub streak: u32,
  pub state: ArtifactState,
}

impl StagedArtifact {
  fn new(path: PathBuf, size: u64, now: Instant) -> Self {
    Self {
      path,
      size,
      last_size: size,
      first_seen: now,
      size_since: now,
      streak: 0,
      state: ArtifactState::Appearing,
    }
  }

  fn observe(&mut self, size: u64, now: Instant) {
    if size == self.size {
      self.streak += 1;
    } else {
      self.last_size = self.size;
      self.size = size;
      self.size_since = now;
      self.streak = 0;
      self.state = ArtifactState::Growing;
    }
  }

  fn is_settled(&self, now: Instant, settle: Duration) -> bool {
    self.state != ArtifactState::Stable
      && self.size > 0
      && self.streak >= 1
      && now.duration_since(self.size_since) >= settle
  }
}

/// Watcher timing and classification.
#[derive(Debug, Clone)]
pub struct WatchOptions {
  pub timeout: Duration,
  pub poll_interval: Duration,
  pub settle_interval: Duration,
  pub classifier: Classifier,
}

impl Default for WatchOptions {
  fn default() -> Self {
    Self {
      timeout: Duration::from_secs(60),
      poll_interval: Duration::from_millis(500),
      settle_interval: Duration::from_millis(1500),
      classifier: Classifier::default(),
    }
  }
}

/// Polls one directory for completed downloads.
#[derive(Debug, Clone, Default)]
pub struct DownloadWatcher {
  options: WatchOptions,
}

struct Scan {
  candidates: Vec<(PathBuf, u64)>,
  in_progress: usize,
}

impl DownloadWatcher {
  pub fn new(options: WatchOptions) -> Self {
    Self { options }
  }

  pub fn options(&self) -> &WatchOptions {
    &self.options
  }

  /// Wait until the directory holds stable candidates and nothing is still
  /// downloading, or until the timeout elapses.
  ///
  /// Returns the sorted stable paths. Running out of time is not an error: the
  /// result is simply whatever was stable by then, possibly nothing. A missing
  /// directory counts as an empty one.
  #[instrument(name = "await_stable_file", skip(self, cancel), fields(dir = %directory.display()))]
  pub async fn wait(&self, directory: &Path, cancel: &CancellationToken) -> Vec<PathBuf> {
    let timeout = self.options.timeout;
    let poll_interval = self.options.poll_interval;
    let settle_interval = self.options.settle_interval;
    let deadline = Instant::now() + timeout;

    let mut tracked: HashMap<PathBuf, StagedArtifact> = HashMap::new();
    let mut stable: BTreeSet<PathBuf> = BTreeSet::new();

    loop {
      let scan = self.scan(directory).await;
      let now = Instant::now();

      tracked.retain(|path, _| scan.candidates.iter().any(|(p, _)| p == path));
      stable.retain(|path| tracked.contains_key(path));

      for (path, size) in scan.candidates {
        match tracked.get_mut(&path) {
          Some(artifact) => {
            artifact.observe(size, now);
            if artifact.state != ArtifactState::Stable {
              // Size moved after it was declared stable.
              stable.remove(&path);
            }
          }
          None => {
            debug!(path = %path.display(), size, "new candidate");
            tracked.insert(path.clone(), StagedArtifact::new(path, size, now));
          }
        }
      }

      let settled: Vec<PathBuf> = tracked
        .values()
        .filter(|a| a.is_settled(now, settle_interval))
        .map(|a| a.path.clone())
        .collect();

      for path in settled {
        if Instant::now() + settle_interval > deadline {
          break;
        }
        if self.reverify(&path, &mut tracked, settle_interval, cancel).await {
          info!(path = %path.display(), "download stable");
          stable.insert(path);
        }
      }

      let pending = scan.in_progress > 0
        || tracked.values().any(|a| a.state != ArtifactState::Stable);
      if !stable.is_empty() && !pending {
        break;
      }

      let now = Instant::now();
      if now >= deadline || cancel.is_cancelled() {
        break;
      }
      let nap = poll_interval.min(deadline - now);
      tokio::select! {
        _ = tokio::time::sleep(nap) => {}
        _ = cancel.cancelled() => break,
      }
    }

    if stable.is_empty() {
      debug!("no stable download before timeout");
    }
    stable.into_iter().collect()
  }

  /// Wait one more settle interval and confirm the size did not move and the
  /// file was not renamed away in the meantime.
  async fn reverify(
    &self,
    path: &Path,
    tracked: &mut HashMap<PathBuf, StagedArtifact>,
    settle_interval: Duration,
    cancel: &CancellationToken,
  ) -> bool {
    tokio::select! {
      _ = tokio::time::sleep(settle_interval) => {}
      _ = cancel.cancelled() => return false,
    }

    let Some(artifact) = tracked.get_mut(path) else {
      return false;
    };
    match fs::metadata(path).await {
      Ok(meta) if meta.len() == artifact.size && meta.len() > 0 => {
        artifact.state = ArtifactState::Stable;
        artifact.streak += 1;
        true
      }
      Ok(meta) => {
        debug!(path = %path.display(), before = artifact.size, after = meta.len(), "size moved during settle");
        artifact.observe(meta.len(), Instant::now());
        false
      }
      Err(e) => {
        debug!(path = %path.display(), error = %e, "candidate vanished during settle");
        tracked.remove(path);
        false
      }
    }
  }

  async fn scan(&self, directory: &Path) -> Scan {
    let mut scan = Scan {
      candidates: Vec::new(),
      in_progress: 0,
    };

    let mut entries = match fs::read_dir(directory).await {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return scan,
      Err(e) => {
        warn!(dir = %directory.display(), error = %e, "failed to read download directory");
        return scan;
      }
    };

    loop {
      let entry = match entries.next_entry().await {
        Ok(Some(entry)) => entry,
        Ok(None) => break,
        Err(e) => {
          warn!(dir = %directory.display(), error = %e, "failed to read directory entry");
          break;
        }
      };
      let Ok(meta) = entry.metadata().await else {
        continue;
      };
      if !meta.is_file() {
        continue;
      }
      let name = entry.file_name();
      let name = name.to_string_lossy();

      match self.options.classifier.classify(&name) {
        EntryKind::Candidate => scan.candidates.push((entry.path(), meta.len())),
        EntryKind::InProgress => {
          debug!(file = %name, size = meta.len(), "download in progress");
          scan.in_progress += 1;
        }
        EntryKind::Ignored => {}
      }
    }

    scan
  }
}

/// Wait for stable document downloads in `directory`.
///
/// Uses the default poll cadence and classifier; see [`DownloadWatcher::wait`].
pub async fn await_stable_file(
  directory: &Path,
  timeout: Duration,
  settle_interval: Duration,
) -> Vec<PathBuf> {
  let watcher = DownloadWatcher::new(WatchOptions {
    timeout,
    poll_interval: settle_interval.min(Duration::from_millis(500)).max(Duration::from_millis(10)),
    settle_interval,
    ..WatchOptions::default()
  });
  watcher.wait(directory, &CancellationToken::new()).await
}
