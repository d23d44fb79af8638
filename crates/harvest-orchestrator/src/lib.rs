//! Harvest Orchestrator
//!
//! Runs one extraction request end to end:
//!
//! 1. validate the host and open a fresh working directory
//! 2. trigger the browsing collaborator (bounded retries)
//! 3. try direct links, script-derived links, constructed URLs, then
//!    watched downloads, stopping at the first strategy that stores a document
//! 4. purge the working directory
//!
//! Progress is reported through an [`ExtractionNotifier`].

mod error;
mod events;
mod orchestrator;
mod report;

pub use error::OrchestratorError;
pub use events::{ChannelNotifier, ExtractionEvent, ExtractionNotifier, NoopNotifier};
pub use orchestrator::Orchestrator;
pub use report::{ExtractionReport, Phase, Strategy};
