use thiserror::Error;

/// Browsing collaborator failures.
#[derive(Debug, Error)]
pub enum NavigatorError {
  /// No collaborator is configured, or it cannot run at all.
  #[error("navigator unavailable: {message}")]
  Unavailable { message: String },

  /// The collaborator process could not be started.
  #[error("failed to start '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  /// The collaborator exited unsuccessfully.
  #[error("navigator exited with {status}: {stderr}")]
  Exit { status: String, stderr: String },

  /// The collaborator ran past its time budget and was killed.
  #[error("navigator stalled after {timeout_secs}s")]
  Stalled { timeout_secs: u64 },

  /// The collaborator reported a failure of its own.
  #[error("navigation failed: {message}")]
  Failed { message: String },

  /// The instruction template could not be rendered.
  #[error("failed to render instructions: {message}")]
  Template { message: String },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

impl NavigatorError {
  /// Whether another attempt might succeed.
  pub fn is_retryable(&self) -> bool {
    matches!(
      self,
      NavigatorError::Exit { .. }
        | NavigatorError::Stalled { .. }
        | NavigatorError::Failed { .. }
        | NavigatorError::Io(_)
    )
  }
}
