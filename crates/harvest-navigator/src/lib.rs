//! Harvest Navigator
//!
//! The browsing collaborator is an external, non-deterministic actor: it gets a
//! natural-language task and a download directory, and returns free text plus
//! whatever files it left behind. [`Navigator`] is that capability.
//!
//! Implementations:
//! - [`CommandNavigator`]: runs an external browsing agent as a child process
//! - [`PageNavigator`]: plain GET of the page, returning its HTML as the text
//! - [`ScriptedNavigator`]: replays canned replies, for tests

mod command;
mod error;
mod instructions;
mod page;
mod scripted;

pub use command::CommandNavigator;
pub use error::NavigatorError;
pub use instructions::render_instructions;
pub use page::PageNavigator;
pub use scripted::{ScriptedNavigator, Step};

use std::path::PathBuf;

use async_trait::async_trait;
use harvest_watch::WorkDir;
use url::Url;

/// What the collaborator produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationOutcome {
  /// Free-form textual result.
  pub text: String,
  /// Files present in the working directory when the collaborator returned.
  /// Some may still be downloading.
  pub files: Vec<PathBuf>,
}

/// A collaborator that can navigate a page and deposit downloads.
#[async_trait]
pub trait Navigator: Send + Sync {
  /// Act on `page` following `instructions`, downloading into `workdir`.
  async fn navigate_and_collect(
    &self,
    page: &Url,
    instructions: &str,
    workdir: &WorkDir,
  ) -> Result<NavigationOutcome, NavigatorError>;

  /// Short name for logs.
  fn name(&self) -> &'static str;
}
