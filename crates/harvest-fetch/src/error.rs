use thiserror::Error;

/// Direct fetch failures. All of them are recoverable from the caller's point
/// of view: the candidate is skipped and the next one is tried.
#[derive(Debug, Error)]
pub enum FetchError {
  /// The server answered with a non-2xx status.
  #[error("{url} returned http {status}")]
  Status { url: String, status: u16 },

  /// The request did not complete within the timeout.
  #[error("timed out fetching {url}")]
  Timeout { url: String },

  /// No connection could be established.
  #[error("could not connect to {url}: {message}")]
  Connect { url: String, message: String },

  /// Any other transport failure.
  #[error("request to {url} failed: {message}")]
  Request { url: String, message: String },

  /// Writing the staged file failed.
  #[error("failed to stage download: {0}")]
  Io(#[from] std::io::Error),
}

impl FetchError {
  pub(crate) fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
    let url = url.to_string();
    if error.is_timeout() {
      FetchError::Timeout { url }
    } else if error.is_connect() {
      FetchError::Connect {
        url,
        message: error.to_string(),
      }
    } else if let Some(status) = error.status() {
      FetchError::Status {
        url,
        status: status.as_u16(),
      }
    } else {
      FetchError::Request {
        url,
        message: error.to_string(),
      }
    }
  }

  /// Whether retrying the same request might succeed.
  pub fn is_transient(&self) -> bool {
    match self {
      FetchError::Status { status, .. } => *status == 429 || *status >= 500,
      FetchError::Timeout { .. } | FetchError::Connect { .. } => true,
      FetchError::Request { .. } | FetchError::Io(_) => false,
    }
  }
}
