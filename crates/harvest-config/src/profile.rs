//! Per-host profiles.
//!
//! A profile carries everything that is specific to one family of procurement
//! sites: the instruction template handed to the browsing collaborator and the
//! URL templates used to guess document locations when nothing better is found.
//! Both are minijinja templates, rendered by the crates that consume them.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default cap on the number of constructed URLs per request.
pub const DEFAULT_MAX_CONSTRUCTED: usize = 10;

/// Instruction template used when a profile does not provide one.
///
/// Variables: `url`, `download_dir`.
pub const DEFAULT_INSTRUCTIONS: &str = r#"You are collecting the PDF attachments of a public procurement event page.

1. Open {{ url }} and wait for the page to finish loading.
2. Find the area that holds the event documents (look for "View Event Package", "Documents", "Attachments", "Files" or "Bid Documents") and open it.
3. For every attachment that is a PDF, trigger a real download rather than opening an in-browser viewer. If a modal or viewer appears, use its Download control, then close it.
4. Save downloads to {{ download_dir }} and wait for each download to finish before starting the next one.
5. Do not click links unrelated to the event documents.

When you are done, reply with a JSON array describing every document you saw, for example
[{"filename": "Solicitation.pdf", "href": "https://host/path/Solicitation.pdf"}],
followed by any other direct document links you noticed on the page."#;

fn default_instructions() -> String {
  DEFAULT_INSTRUCTIONS.to_string()
}

fn default_max_constructed() -> usize {
  DEFAULT_MAX_CONSTRUCTED
}

/// Site-family specific knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostProfile {
  /// Host this profile applies to (subdomains included).
  pub host: String,

  /// Instruction template for the browsing collaborator.
  #[serde(default = "default_instructions")]
  pub instructions: String,

  /// Document URL templates, tried as a last resort.
  ///
  /// Variables: `scheme`, `host`, `org`, `event`, `segments`, and `token` for
  /// templates that reference identifiers found in the collaborator's output.
  #[serde(default)]
  pub url_templates: Vec<String>,

  /// Upper bound on URLs synthesized from `url_templates`.
  #[serde(default = "default_max_constructed")]
  pub max_constructed: usize,
}

impl HostProfile {
  /// A profile with the default instructions and no URL templates.
  pub fn generic(host: impl Into<String>) -> Self {
    Self {
      host: host.into(),
      instructions: default_instructions(),
      url_templates: Vec::new(),
      max_constructed: DEFAULT_MAX_CONSTRUCTED,
    }
  }

  /// Built-in profile for the California eProcurement event pages
  /// (`/event/{org}/{event}`).
  ///
  /// The URL templates are unconfirmed guesses at where the site keeps event
  /// attachments; they only run after every other strategy came up empty.
  pub fn caleprocure() -> Self {
    Self {
      host: "caleprocure.ca.gov".to_string(),
      instructions: default_instructions(),
      url_templates: vec![
        "{{ scheme }}://{{ host }}/event/{{ org }}/{{ event }}/attachments/{{ event }}.pdf".to_string(),
        "{{ scheme }}://{{ host }}/PSRelay/ERFX/{{ org }}/{{ event }}/{{ event }}.pdf".to_string(),
        "{{ scheme }}://{{ host }}/documents/{{ org }}/{{ token }}.pdf".to_string(),
      ],
      max_constructed: DEFAULT_MAX_CONSTRUCTED,
    }
  }

  pub fn matches(&self, host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let own = self.host.to_ascii_lowercase();
    host == own || host.ends_with(&format!(".{}", own))
  }
}

/// The set of known host profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileSet {
  profiles: Vec<HostProfile>,
}

impl Default for ProfileSet {
  fn default() -> Self {
    Self {
      profiles: vec![HostProfile::caleprocure()],
    }
  }
}

impl ProfileSet {
  pub fn new(profiles: Vec<HostProfile>) -> Self {
    Self { profiles }
  }

  /// Load profiles from a JSON array file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ProfileIo {
      path: path.display().to_string(),
      source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::ProfileParse {
      path: path.display().to_string(),
      source,
    })
  }

  pub fn profiles(&self) -> &[HostProfile] {
    &self.profiles
  }

  /// The most specific profile for `host`, or a generic one.
  pub fn for_host(&self, host: &str) -> HostProfile {
    self
      .profiles
      .iter()
      .filter(|p| p.matches(host))
      .max_by_key(|p| p.host.len())
      .cloned()
      .unwrap_or_else(|| HostProfile::generic(host))
  }
}
