//! Harvest Extract
//!
//! Pure functions over bytes and text:
//! - [`pdf`]: the signature check that decides whether bytes are a PDF
//! - [`extract_candidates`]: document URLs recovered from the collaborator's output
//! - [`deduplicate_urls`]: order-preserving URL deduplication

mod candidate;
mod constructed;
mod dedup;
mod extractor;
pub mod pdf;

pub use candidate::{CandidateReference, Origin, Target};
pub use constructed::constructed;
pub use dedup::{deduplicate_urls, normalize_url};
pub use extractor::{
  direct_links, extract_candidates, is_fetchable_url, is_likely_document_url, script_derived,
  within_host,
};
pub use pdf::{PDF_SIGNATURE, ValidationError, Verdict, classify, is_valid_pdf};
