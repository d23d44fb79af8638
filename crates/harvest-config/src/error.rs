use thiserror::Error;

/// Configuration-level failures. These are the only errors that reach the
/// caller of an extraction as a failed request.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// A credential the pipeline depends on is not set.
  #[error("missing required credential: {name}")]
  MissingCredential { name: String },

  /// The request targets a host outside the allow-list.
  #[error("host '{host}' is not allowed (allowed: {allowed})")]
  DisallowedHost { host: String, allowed: String },

  /// The request URL is not a usable http(s) URL.
  #[error("invalid url '{url}': {message}")]
  InvalidUrl { url: String, message: String },

  /// A request field is missing or malformed.
  #[error("invalid request: {message}")]
  InvalidRequest { message: String },

  /// The host profile file could not be read.
  #[error("failed to read profiles from {path}: {source}")]
  ProfileIo {
    path: String,
    #[source]
    source: std::io::Error,
  },

  /// The host profile file is not valid JSON.
  #[error("failed to parse profiles from {path}: {source}")]
  ProfileParse {
    path: String,
    #[source]
    source: serde_json::Error,
  },
}
