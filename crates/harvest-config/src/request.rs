use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// Hosts an extraction is allowed to target.
///
/// A host matches an entry when it is equal to it or is a subdomain of it,
/// compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowList {
  hosts: Vec<String>,
}

impl AllowList {
  pub fn new<I, S>(hosts: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let hosts = hosts
      .into_iter()
      .map(|h| h.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
      .filter(|h| !h.is_empty())
      .collect();
    Self { hosts }
  }

  /// Parse a comma separated list.
  pub fn parse(list: &str) -> Self {
    Self::new(list.split(','))
  }

  pub fn hosts(&self) -> &[String] {
    &self.hosts
  }

  pub fn permits(&self, host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    self
      .hosts
      .iter()
      .any(|allowed| host == *allowed || host.ends_with(&format!(".{}", allowed)))
  }
}

/// A request to extract documents from one page.
///
/// Construction only checks the shape of the request; [`ExtractionRequest::authorize`]
/// must pass before the request is acted upon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRequest {
  pub source_url: Url,
  pub destination_bucket: String,
  pub destination_prefix: String,
}

impl ExtractionRequest {
  pub fn new(
    source_url: &str,
    destination_bucket: impl Into<String>,
    destination_prefix: impl Into<String>,
  ) -> Result<Self, ConfigError> {
    let source_url = parse_page_url(source_url)?;

    let destination_bucket = destination_bucket.into().trim().to_string();
    if destination_bucket.is_empty() {
      return Err(ConfigError::InvalidRequest {
        message: "destination bucket must not be empty".to_string(),
      });
    }

    Ok(Self {
      source_url,
      destination_bucket,
      destination_prefix: destination_prefix.into(),
    })
  }

  /// Host of the source page (always present for http(s) URLs).
  pub fn host(&self) -> &str {
    self.source_url.host_str().unwrap_or_default()
  }

  /// Check the source host against the allow-list.
  pub fn authorize(&self, allow: &AllowList) -> Result<(), ConfigError> {
    if allow.permits(self.host()) {
      Ok(())
    } else {
      Err(ConfigError::DisallowedHost {
        host: self.host().to_string(),
        allowed: allow.hosts().join(", "),
      })
    }
  }
}

fn parse_page_url(raw: &str) -> Result<Url, ConfigError> {
  let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidUrl {
    url: raw.to_string(),
    message: e.to_string(),
  })?;

  if !matches!(url.scheme(), "http" | "https") {
    return Err(ConfigError::InvalidUrl {
      url: raw.to_string(),
      message: format!("unsupported scheme '{}'", url.scheme()),
    });
  }
  if url.host_str().is_none() {
    return Err(ConfigError::InvalidUrl {
      url: raw.to_string(),
      message: "url has no host".to_string(),
    });
  }

  Ok(url)
}
