use harvest_config::ConfigError;
use harvest_navigator::NavigatorError;
use thiserror::Error;

/// Errors that abort an extraction. Per-candidate and per-strategy failures
/// never show up here; they end up as diagnostics on the report.
#[derive(Debug, Error)]
pub enum OrchestratorError {
  /// The request or the process configuration is unusable.
  #[error(transparent)]
  Config(#[from] ConfigError),

  /// The host profile's instructions could not be rendered.
  #[error("invalid host profile: {0}")]
  Profile(#[source] NavigatorError),

  /// The request working directory could not be prepared.
  #[error("working directory error: {0}")]
  WorkDir(#[source] std::io::Error),

  /// The extraction was cancelled.
  #[error("extraction cancelled")]
  Cancelled,
}
