//! Harvest Retry
//!
//! A single bounded-retry policy used wherever the extraction pipeline talks to
//! something unreliable: the browsing collaborator and per-candidate document
//! fetches. A [`RetryPolicy`] is plain data (it deserializes from config files)
//! and [`RetryPolicy::run`] drives an async operation under it.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryBackoff {
  /// Wait `delay_ms` between every attempt.
  #[default]
  Fixed,
  /// Double the delay after every failed attempt.
  Exponential,
}

/// Bounded retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
  /// Total number of attempts, including the first one. Zero is treated as one.
  pub max_attempts: u32,
  /// Base delay between attempts.
  pub delay_ms: u64,
  #[serde(default)]
  pub backoff: RetryBackoff,
  /// Upper bound for exponential delays.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_delay_ms: Option<u64>,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self::fixed(3, Duration::from_secs(1))
  }
}

impl RetryPolicy {
  /// A policy that waits the same amount of time between attempts.
  pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
    Self {
      max_attempts,
      delay_ms: delay.as_millis() as u64,
      backoff: RetryBackoff::Fixed,
      max_delay_ms: None,
    }
  }

  /// A policy that doubles its delay after each failure, capped at `max_delay`.
  pub fn exponential(max_attempts: u32, delay: Duration, max_delay: Duration) -> Self {
    Self {
      max_attempts,
      delay_ms: delay.as_millis() as u64,
      backoff: RetryBackoff::Exponential,
      max_delay_ms: Some(max_delay.as_millis() as u64),
    }
  }

  /// A policy that never retries.
  pub fn once() -> Self {
    Self::fixed(1, Duration::ZERO)
  }

  /// Effective number of attempts (never zero).
  pub fn attempts(&self) -> u32 {
    self.max_attempts.max(1)
  }

  /// Delay to wait after the given (1-based) attempt failed.
  pub fn delay_after(&self, attempt: u32) -> Duration {
    let millis = match self.backoff {
      RetryBackoff::Fixed => self.delay_ms,
      RetryBackoff::Exponential => {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        let scaled = self.delay_ms.saturating_mul(factor);
        match self.max_delay_ms {
          Some(cap) => scaled.min(cap),
          None => scaled,
        }
      }
    };
    Duration::from_millis(millis)
  }

  /// Run `op` until it succeeds, fails with a non-retryable error, or the
  /// attempt budget is spent. The closure receives the 1-based attempt number.
  ///
  /// The last error is returned unchanged when the budget runs out.
  pub async fn run<T, E, F, Fut, R>(&self, operation: &str, is_retryable: R, mut op: F) -> Result<T, E>
  where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: Display,
  {
    let attempts = self.attempts();
    let mut attempt = 1;

    loop {
      match op(attempt).await {
        Ok(value) => {
          if attempt > 1 {
            debug!(operation, attempt, "succeeded after retry");
          }
          return Ok(value);
        }
        Err(e) if attempt < attempts && is_retryable(&e) => {
          let delay = self.delay_after(attempt);
          warn!(
            operation,
            attempt,
            max_attempts = attempts,
            delay_ms = delay.as_millis() as u64,
            error = %e,
            "attempt failed, retrying"
          );
          tokio::time::sleep(delay).await;
          attempt += 1;
        }
        Err(e) => return Err(e),
      }
    }
  }
}
