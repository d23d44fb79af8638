//! Harvest Fetch
//!
//! Direct retrieval of candidate documents over plain HTTP(S), independent of
//! the browsing session. Bytes are staged on disk verbatim; a signature or
//! content-type mismatch is logged here but judged by the orchestrator.

mod error;
mod fetcher;
mod filename;

pub use error::FetchError;
pub use fetcher::{FetchedFile, Fetcher, HttpFetcher};
pub use filename::{filename_for_url, sanitize_file_name};
