//! Extraction events and notifiers for observability.
//!
//! Events are emitted while a request moves through its phases, so callers can
//! log progress, stream it somewhere, or assert on it in tests.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::report::{Phase, Strategy};

/// Events emitted during an extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionEvent {
  /// The request passed validation and has a working directory.
  ExtractionStarted { request_id: String, url: String },

  /// The state machine entered a new phase.
  PhaseChanged { request_id: String, phase: Phase },

  /// One collaborator attempt is starting.
  NavigatorAttempt { request_id: String, attempt: u32 },

  /// The collaborator failed after its retry budget.
  NavigatorFailed { request_id: String, error: String },

  /// A strategy tier is starting.
  StrategyStarted {
    request_id: String,
    strategy: Strategy,
    candidates: usize,
  },

  /// A candidate was discarded.
  CandidateRejected {
    request_id: String,
    strategy: Strategy,
    candidate: String,
    reason: String,
  },

  /// A document was stored.
  DocumentStored {
    request_id: String,
    strategy: Strategy,
    reference: String,
  },

  /// A strategy tier finished.
  StrategyFinished {
    request_id: String,
    strategy: Strategy,
    stored: usize,
  },

  /// Local artifacts were removed.
  Purged { request_id: String, removed: usize },

  /// The extraction finished, with or without documents.
  ExtractionCompleted { request_id: String, files: usize },

  /// The extraction aborted with an error.
  ExtractionFailed { request_id: String, error: String },
}

/// Trait for receiving extraction events.
///
/// The orchestrator calls `notify` for each event; implementations decide
/// what to do with them.
pub trait ExtractionNotifier: Send + Sync {
  fn notify(&self, event: ExtractionEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExtractionNotifier for NoopNotifier {
  fn notify(&self, _event: ExtractionEvent) {}
}

/// A notifier that sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<ExtractionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExtractionEvent>) -> Self {
    Self { sender }
  }
}

impl ExtractionNotifier for ChannelNotifier {
  fn notify(&self, event: ExtractionEvent) {
    // Receiver may have been dropped.
    let _ = self.sender.send(event);
  }
}
