use std::time::Duration;

use async_trait::async_trait;
use harvest_watch::WorkDir;
use tracing::{info, instrument};
use url::Url;

use crate::error::NavigatorError;
use crate::{NavigationOutcome, Navigator};

/// Fallback collaborator: fetches the page's HTML and hands it back as the
/// textual result. It never clicks anything, so it never downloads files.
#[derive(Debug, Clone)]
pub struct PageNavigator {
  client: reqwest::Client,
}

impl PageNavigator {
  pub fn new(timeout: Duration) -> Result<Self, NavigatorError> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .user_agent(concat!("harvest/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| NavigatorError::Unavailable {
        message: e.to_string(),
      })?;
    Ok(Self { client })
  }
}

#[async_trait]
impl Navigator for PageNavigator {
  #[instrument(skip(self, _instructions, workdir), fields(page = %page))]
  async fn navigate_and_collect(
    &self,
    page: &Url,
    _instructions: &str,
    workdir: &WorkDir,
  ) -> Result<NavigationOutcome, NavigatorError> {
    let failed = |e: reqwest::Error| NavigatorError::Failed {
      message: e.to_string(),
    };
    let response = self
      .client
      .get(page.clone())
      .send()
      .await
      .and_then(|r| r.error_for_status())
      .map_err(failed)?;
    let text = response.text().await.map_err(failed)?;

    info!(len = text.len(), "page fetched");
    Ok(NavigationOutcome {
      text,
      files: workdir.snapshot().await?,
    })
  }

  fn name(&self) -> &'static str {
    "page"
  }
}
