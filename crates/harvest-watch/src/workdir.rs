//! Per-request working directories.
//!
//! The browsing collaborator writes into a [`WorkDir`], the watcher reads from
//! it, and the orchestrator purges it. Passing the handle explicitly keeps two
//! requests from ever looking at each other's downloads.
//!
//! ```text
//! {base}/
//! └── {request_id}/
//!     ├── Solicitation.pdf      <- collaborator downloads (watched)
//!     └── fetched/              <- direct fetches (never watched)
//!         ├── 0/Addendum_1.pdf  <- one slot per candidate
//!         └── 1/Addendum_1.pdf
//! ```

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

const STAGING_DIR: &str = "fetched";

/// A request-scoped working directory.
///
/// Dropping a handle that was never purged removes the directory
/// synchronously, so cleanup also happens on panics and cancellation.
#[derive(Debug)]
pub struct WorkDir {
  path: PathBuf,
  purged: bool,
}

impl WorkDir {
  /// Create (or reuse) `{base}/{request_id}` and clear anything left behind
  /// by an earlier run.
  pub async fn open(base: &Path, request_id: &str) -> io::Result<Self> {
    let path = base.join(request_id);
    fs::create_dir_all(&path).await?;

    let dir = Self {
      path,
      purged: false,
    };
    let stale = dir.clear().await?;
    if stale > 0 {
      info!(path = %dir.path.display(), removed = stale, "removed stale artifacts");
    }
    Ok(dir)
  }

  /// Directory the collaborator downloads into.
  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Directory direct fetches are staged in.
  pub fn staging_dir(&self) -> PathBuf {
    self.path.join(STAGING_DIR)
  }

  /// Create a fresh per-candidate directory under the staging directory, so
  /// same-named documents from different URLs never overwrite each other.
  pub async fn staging_slot(&self, slot: usize) -> io::Result<PathBuf> {
    let dir = self.staging_dir().join(slot.to_string());
    fs::create_dir_all(&dir).await?;
    Ok(dir)
  }

  /// Remove every request directory left under `base` by runs that never
  /// reached their own purge (killed processes, crashes).
  ///
  /// Assumes nothing else is using `base` concurrently.
  pub async fn sweep(base: &Path) -> io::Result<usize> {
    let mut removed = 0;
    let mut entries = match fs::read_dir(base).await {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
      Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      let result = if entry.file_type().await?.is_dir() {
        fs::remove_dir_all(&path).await
      } else {
        fs::remove_file(&path).await
      };
      match result {
        Ok(()) => removed += 1,
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove leftover request directory"),
      }
    }
    if removed > 0 {
      info!(base = %base.display(), removed, "swept leftover request directories");
    }
    Ok(removed)
  }

  pub fn is_purged(&self) -> bool {
    self.purged
  }

  /// Top-level files currently in the directory, sorted.
  pub async fn snapshot(&self) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = match fs::read_dir(&self.path).await {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(files),
      Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
      if entry.file_type().await?.is_file() {
        files.push(entry.path());
      }
    }
    files.sort();
    Ok(files)
  }

  /// Remove every entry inside the directory, keeping the directory itself.
  pub async fn clear(&self) -> io::Result<usize> {
    let mut removed = 0;
    let mut entries = match fs::read_dir(&self.path).await {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
      Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      let result = if entry.file_type().await?.is_dir() {
        fs::remove_dir_all(&path).await
      } else {
        fs::remove_file(&path).await
      };
      match result {
        Ok(()) => removed += 1,
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove artifact"),
      }
    }
    Ok(removed)
  }

  /// Delete all local artifacts and the directory itself.
  ///
  /// Only the first call does any work; later calls return `Ok(0)`.
  pub async fn purge(&mut self) -> io::Result<usize> {
    if self.purged {
      return Ok(0);
    }
    let removed = self.clear().await?;
    match fs::remove_dir(&self.path).await {
      Ok(()) => {}
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => return Err(e),
    }
    self.purged = true;
    debug!(path = %self.path.display(), removed, "working directory purged");
    Ok(removed)
  }
}

impl Drop for WorkDir {
  fn drop(&mut self) {
    if self.purged {
      return;
    }
    match std::fs::remove_dir_all(&self.path) {
      Ok(()) => debug!(path = %self.path.display(), "working directory purged on drop"),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => warn!(path = %self.path.display(), error = %e, "failed to purge working directory"),
    }
  }
}
