use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use harvest_watch::WorkDir;
use url::Url;

use crate::error::NavigatorError;
use crate::{NavigationOutcome, Navigator};

/// One canned collaborator run.
#[derive(Debug, Clone)]
pub enum Step {
  /// Return `text` after writing `files` (name, bytes) into the working directory.
  Reply {
    text: String,
    files: Vec<(String, Vec<u8>)>,
  },
  /// Fail with a retryable error.
  Fail(String),
}

impl Step {
  pub fn text(text: impl Into<String>) -> Self {
    Step::Reply {
      text: text.into(),
      files: Vec::new(),
    }
  }

  pub fn download(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
    Step::Reply {
      text: String::new(),
      files: vec![(name.into(), bytes.into())],
    }
  }
}

/// Deterministic collaborator that replays [`Step`]s in order. Once the
/// script runs out it replies with empty text.
#[derive(Debug, Default)]
pub struct ScriptedNavigator {
  steps: Mutex<VecDeque<Step>>,
  calls: AtomicUsize,
  last_instructions: Mutex<Option<String>>,
}

impl ScriptedNavigator {
  pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
    Self {
      steps: Mutex::new(steps.into_iter().collect()),
      ..Self::default()
    }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn last_instructions(&self) -> Option<String> {
    self.last_instructions.lock().ok().and_then(|i| i.clone())
  }

  fn next_step(&self) -> Option<Step> {
    self.steps.lock().ok().and_then(|mut steps| steps.pop_front())
  }
}

#[async_trait]
impl Navigator for ScriptedNavigator {
  async fn navigate_and_collect(
    &self,
    _page: &Url,
    instructions: &str,
    workdir: &WorkDir,
  ) -> Result<NavigationOutcome, NavigatorError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if let Ok(mut last) = self.last_instructions.lock() {
      *last = Some(instructions.to_string());
    }

    match self.next_step() {
      Some(Step::Fail(message)) => Err(NavigatorError::Failed { message }),
      Some(Step::Reply { text, files }) => {
        for (name, bytes) in files {
          tokio::fs::write(workdir.path().join(name), bytes).await?;
        }
        Ok(NavigationOutcome {
          text,
          files: workdir.snapshot().await?,
        })
      }
      None => Ok(NavigationOutcome {
        text: String::new(),
        files: workdir.snapshot().await?,
      }),
    }
  }

  fn name(&self) -> &'static str {
    "scripted"
  }
}
