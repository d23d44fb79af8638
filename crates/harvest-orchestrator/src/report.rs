use std::fmt;

use harvest_artifact::StoredReference;
use harvest_extract::Origin;
use serde::{Deserialize, Serialize};

/// Acquisition strategies, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
  /// A: direct document links.
  Direct,
  /// B: script-derived links.
  Script,
  /// C: URLs constructed from host templates.
  Constructed,
  /// Files the collaborator downloaded into the working directory.
  Watch,
}

impl Strategy {
  pub const ORDER: [Strategy; 4] = [
    Strategy::Direct,
    Strategy::Script,
    Strategy::Constructed,
    Strategy::Watch,
  ];

  pub fn for_origin(origin: Origin) -> Self {
    match origin {
      Origin::DirectLink => Strategy::Direct,
      Origin::ScriptDerived => Strategy::Script,
      Origin::PatternConstructed => Strategy::Constructed,
      Origin::LocalFile => Strategy::Watch,
    }
  }
}

impl fmt::Display for Strategy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Strategy::Direct => "direct",
      Strategy::Script => "script",
      Strategy::Constructed => "constructed",
      Strategy::Watch => "watch",
    };
    f.write_str(name)
  }
}

/// Request lifecycle.
///
/// ```text
/// Init -> Triggered -> Strategy(Direct|Script|Constructed|Watch) -> Uploaded | Exhausted
///                                                         -> Purged -> Done
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  Init,
  Triggered,
  Strategy(Strategy),
  Uploaded,
  Exhausted,
  Purged,
  Done,
}

/// Result of one extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionReport {
  pub request_id: String,
  pub files: Vec<StoredReference>,
  /// Strategy that produced the documents, if any did.
  pub strategy: Option<Strategy>,
  /// Terminal phase before cleanup: `Uploaded` or `Exhausted`.
  pub outcome: Phase,
  /// Recoverable problems encountered along the way.
  pub diagnostics: Vec<String>,
}

impl ExtractionReport {
  pub fn is_success(&self) -> bool {
    !self.files.is_empty()
  }

  /// Stored references as `s3://` URIs.
  pub fn uris(&self) -> Vec<String> {
    self.files.iter().map(StoredReference::uri).collect()
  }

  /// One-line human summary.
  pub fn message(&self) -> String {
    if self.is_success() {
      return format!("Successfully extracted {} documents", self.files.len());
    }
    if self.diagnostics.is_empty() {
      "No documents found".to_string()
    } else {
      format!("No documents found: {}", self.diagnostics.join("; "))
    }
  }
}
