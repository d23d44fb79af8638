use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

/// Where a candidate came from. Variant order is priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
  /// An absolute document link in the collaborator's output.
  DirectLink,
  /// A link recovered from handlers, relative paths or form targets.
  ScriptDerived,
  /// A URL synthesized from host naming templates.
  PatternConstructed,
  /// A file the collaborator left in the working directory.
  LocalFile,
}

impl fmt::Display for Origin {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Origin::DirectLink => "direct_link",
      Origin::ScriptDerived => "script_derived",
      Origin::PatternConstructed => "pattern_constructed",
      Origin::LocalFile => "local_file",
    };
    f.write_str(name)
  }
}

/// What a candidate points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
  Remote(Url),
  Local(PathBuf),
}

/// A discovered but unconfirmed pointer to a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateReference {
  pub target: Target,
  pub origin: Origin,
  /// Name the collaborator gave the document, if any.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub filename_hint: Option<String>,
}

impl CandidateReference {
  pub fn remote(url: Url, origin: Origin) -> Self {
    Self {
      target: Target::Remote(url),
      origin,
      filename_hint: None,
    }
  }

  pub fn local(path: impl Into<PathBuf>) -> Self {
    Self {
      target: Target::Local(path.into()),
      origin: Origin::LocalFile,
      filename_hint: None,
    }
  }

  pub fn with_filename_hint(mut self, hint: impl Into<String>) -> Self {
    let hint = hint.into();
    if !hint.trim().is_empty() {
      self.filename_hint = Some(hint.trim().to_string());
    }
    self
  }

  pub fn url(&self) -> Option<&Url> {
    match &self.target {
      Target::Remote(url) => Some(url),
      Target::Local(_) => None,
    }
  }

  pub fn path(&self) -> Option<&Path> {
    match &self.target {
      Target::Local(path) => Some(path),
      Target::Remote(_) => None,
    }
  }
}

impl fmt::Display for CandidateReference {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.target {
      Target::Remote(url) => write!(f, "{} ({})", url, self.origin),
      Target::Local(path) => write!(f, "{} ({})", path.display(), self.origin),
    }
  }
}
