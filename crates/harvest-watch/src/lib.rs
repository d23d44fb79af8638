//! Harvest Watch
//!
//! Local-filesystem side of an extraction:
//! - [`WorkDir`]: the per-request directory shared by the browsing collaborator,
//!   the watcher, and the purge step
//! - [`DownloadWatcher`] / [`await_stable_file`]: detect downloads that have
//!   finished writing

mod classify;
mod watcher;
mod workdir;

pub use classify::{Classifier, EntryKind};
pub use watcher::{ArtifactState, DownloadWatcher, StagedArtifact, WatchOptions, await_stable_file};
pub use workdir::WorkDir;
