//! PDF content validation.
//!
//! The signature check is authoritative. A declared content type is only ever
//! used to flag disagreement, never to accept bytes the signature rejects.

use thiserror::Error;
use tracing::warn;

/// Magic number every PDF starts with.
pub const PDF_SIGNATURE: &[u8; 4] = b"%PDF";

/// Outcome of validating a byte blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
  /// Signature present and the declared type (if any) agrees.
  Valid,
  /// Signature present but the declared type says something else.
  Suspect,
  /// Signature missing or too few bytes to check.
  Invalid,
}

impl Verdict {
  /// Whether the bytes may be stored. Suspect documents are accepted with a
  /// warning already logged.
  pub fn is_acceptable(self) -> bool {
    matches!(self, Verdict::Valid | Verdict::Suspect)
  }
}

/// Bytes rejected by the signature check.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
  #[error("only {len} bytes, too short for a PDF signature")]
  TooShort { len: usize },

  #[error("missing PDF signature (starts with {prefix:?})")]
  BadSignature { prefix: String },
}

pub fn is_valid_pdf(bytes: &[u8]) -> bool {
  bytes.len() >= PDF_SIGNATURE.len() && bytes.starts_with(PDF_SIGNATURE)
}

/// Check the signature and return why it failed.
pub fn check_signature(bytes: &[u8]) -> Result<(), ValidationError> {
  if bytes.len() < PDF_SIGNATURE.len() {
    return Err(ValidationError::TooShort { len: bytes.len() });
  }
  if !bytes.starts_with(PDF_SIGNATURE) {
    let prefix = String::from_utf8_lossy(&bytes[..bytes.len().min(8)]).into_owned();
    return Err(ValidationError::BadSignature { prefix });
  }
  Ok(())
}

fn declares_pdf(content_type: &str) -> bool {
  content_type.to_ascii_lowercase().contains("pdf")
}

/// Classify bytes, logging whenever the declared content type disagrees with
/// the signature.
pub fn classify(content_type: Option<&str>, bytes: &[u8]) -> Verdict {
  let content_type = content_type.map(str::trim).filter(|c| !c.is_empty());

  match (check_signature(bytes), content_type) {
    (Ok(()), None) => Verdict::Valid,
    (Ok(()), Some(ct)) if declares_pdf(ct) => Verdict::Valid,
    (Ok(()), Some(ct)) => {
      warn!(content_type = ct, len = bytes.len(), "pdf signature present but content type disagrees");
      Verdict::Suspect
    }
    (Err(e), Some(ct)) if declares_pdf(ct) => {
      warn!(content_type = ct, len = bytes.len(), error = %e, "content type claims pdf but signature check failed");
      Verdict::Invalid
    }
    (Err(_), _) => Verdict::Invalid,
  }
}
