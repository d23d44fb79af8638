//! Directory entry classification.

/// What a directory entry means to the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
  /// A browser is still writing this file.
  InProgress,
  /// A finished download with a document extension.
  Candidate,
  /// Anything else.
  Ignored,
}

/// Classifies file names by download state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
  completed_extensions: Vec<String>,
  in_progress_suffixes: Vec<String>,
  in_progress_prefixes: Vec<String>,
}

impl Default for Classifier {
  fn default() -> Self {
    Self {
      completed_extensions: vec!["pdf".to_string()],
      in_progress_suffixes: [".crdownload", ".part", ".partial", ".download", ".tmp"]
        .into_iter()
        .map(String::from)
        .collect(),
      // Chrome stages some downloads under a hidden temporary name first.
      in_progress_prefixes: vec![".com.google.chrome.".to_string()],
    }
  }
}

impl Classifier {
  /// Replace the set of completed-download extensions (without the dot).
  pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    self.completed_extensions = extensions
      .into_iter()
      .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
      .collect();
    self
  }

  pub fn classify(&self, file_name: &str) -> EntryKind {
    let name = file_name.to_ascii_lowercase();

    if self.in_progress_suffixes.iter().any(|s| name.ends_with(s.as_str()))
      || self.in_progress_prefixes.iter().any(|p| name.starts_with(p.as_str()))
    {
      return EntryKind::InProgress;
    }

    match name.rsplit_once('.') {
      Some((stem, ext)) if !stem.is_empty() && self.completed_extensions.iter().any(|e| e == ext) => {
        EntryKind::Candidate
      }
      _ => EntryKind::Ignored,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_classify_default() {
    let c = Classifier::default();
    assert_eq!(c.classify("Solicitation.PDF"), EntryKind::Candidate);
    assert_eq!(c.classify("b.pdf.crdownload"), EntryKind::InProgress);
    assert_eq!(c.classify("report.pdf.part"), EntryKind::InProgress);
    assert_eq!(c.classify("Unconfirmed 1234.crdownload"), EntryKind::InProgress);
    assert_eq!(c.classify(".com.google.Chrome.aB12cd"), EntryKind::InProgress);
    assert_eq!(c.classify("notes.txt"), EntryKind::Ignored);
    assert_eq!(c.classify(".pdf"), EntryKind::Ignored);
    assert_eq!(c.classify("pdf"), EntryKind::Ignored);
  }

  #[test]
  fn test_custom_extensions() {
    let c = Classifier::default().with_extensions([".docx", "PDF"]);
    assert_eq!(c.classify("a.docx"), EntryKind::Candidate);
    assert_eq!(c.classify("a.pdf"), EntryKind::Candidate);
    assert_eq!(c.classify("a.xlsx"), EntryKind::Ignored);
  }
}
