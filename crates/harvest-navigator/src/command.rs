//! External browsing agent driven over stdin/stdout.
//!
//! Protocol:
//! - the instructions are written to the child's stdin, then stdin is closed
//! - `HARVEST_PAGE_URL` and `HARVEST_DOWNLOAD_DIR` are set in its environment
//! - everything the child prints on stdout is the textual result
//! - a non-zero exit status is a failure; stderr is kept for the error

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use harvest_watch::WorkDir;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::NavigatorError;
use crate::{NavigationOutcome, Navigator};

const STDERR_TAIL: usize = 2000;

enum Line {
  Out(String),
  Err(String),
}

/// Runs a browsing agent as a child process.
#[derive(Debug, Clone)]
pub struct CommandNavigator {
  program: String,
  args: Vec<String>,
  timeout: Duration,
}

impl CommandNavigator {
  /// `command` is the program followed by its arguments.
  pub fn new(command: Vec<String>, timeout: Duration) -> Result<Self, NavigatorError> {
    let mut parts = command.into_iter();
    let program = parts
      .next()
      .filter(|p| !p.trim().is_empty())
      .ok_or_else(|| NavigatorError::Unavailable {
        message: "empty navigator command".to_string(),
      })?;
    Ok(Self {
      program,
      args: parts.collect(),
      timeout,
    })
  }
}

fn spawn_line_reader<R>(reader: R, tx: mpsc::UnboundedSender<Line>, stderr: bool)
where
  R: AsyncRead + Unpin + Send + 'static,
{
  tokio::spawn(async move {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
      let line = if stderr { Line::Err(line) } else { Line::Out(line) };
      if tx.send(line).is_err() {
        break;
      }
    }
  });
}

fn tail(text: &str, max: usize) -> String {
  let trimmed = text.trim();
  let count = trimmed.chars().count();
  if count <= max {
    trimmed.to_string()
  } else {
    trimmed.chars().skip(count - max).collect()
  }
}

#[async_trait]
impl Navigator for CommandNavigator {
  #[instrument(skip(self, instructions, workdir), fields(program = %self.program, page = %page))]
  async fn navigate_and_collect(
    &self,
    page: &Url,
    instructions: &str,
    workdir: &WorkDir,
  ) -> Result<NavigationOutcome, NavigatorError> {
    let mut child = Command::new(&self.program)
      .args(&self.args)
      .env("HARVEST_PAGE_URL", page.as_str())
      .env("HARVEST_DOWNLOAD_DIR", workdir.path())
      .current_dir(workdir.path())
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .spawn()
      .map_err(|source| NavigatorError::Spawn {
        program: self.program.clone(),
        source,
      })?;

    if let Some(mut stdin) = child.stdin.take() {
      // A child that never reads stdin is not an error.
      if let Err(e) = stdin.write_all(instructions.as_bytes()).await {
        debug!(error = %e, "navigator did not accept instructions on stdin");
      }
      drop(stdin);
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    if let Some(stdout) = child.stdout.take() {
      spawn_line_reader(stdout, tx.clone(), false);
    }
    if let Some(stderr) = child.stderr.take() {
      spawn_line_reader(stderr, tx.clone(), true);
    }
    drop(tx);

    let mut text = String::new();
    let mut stderr = String::new();
    let deadline = tokio::time::sleep(self.timeout);
    tokio::pin!(deadline);

    loop {
      tokio::select! {
        _ = &mut deadline => {
          warn!(timeout_secs = self.timeout.as_secs(), "navigator stalled, killing it");
          let _ = child.kill().await;
          return Err(NavigatorError::Stalled { timeout_secs: self.timeout.as_secs() });
        }
        line = rx.recv() => match line {
          Some(Line::Out(line)) => {
            text.push_str(&line);
            text.push('\n');
          }
          Some(Line::Err(line)) => {
            debug!(line = %line, "navigator stderr");
            stderr.push_str(&line);
            stderr.push('\n');
          }
          None => break,
        },
      }
    }

    let status = match tokio::time::timeout(Duration::from_secs(5), child.wait()).await {
      Ok(status) => status?,
      Err(_) => {
        let _ = child.kill().await;
        return Err(NavigatorError::Stalled {
          timeout_secs: self.timeout.as_secs(),
        });
      }
    };
    if !status.success() {
      return Err(NavigatorError::Exit {
        status: status.to_string(),
        stderr: tail(&stderr, STDERR_TAIL),
      });
    }

    let files = workdir.snapshot().await?;
    info!(text_len = text.len(), files = files.len(), "navigator finished");
    Ok(NavigationOutcome { text, files })
  }

  fn name(&self) -> &'static str {
    "command"
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_command_is_unavailable() {
    assert!(matches!(
      CommandNavigator::new(vec![], Duration::from_secs(1)),
      Err(NavigatorError::Unavailable { .. })
    ));
    assert!(CommandNavigator::new(vec!["  ".to_string()], Duration::from_secs(1)).is_err());
  }

  #[test]
  fn test_tail_keeps_end() {
    assert_eq!(tail("  abcdef \n", 3), "def");
    assert_eq!(tail("ab", 3), "ab");
  }
}
