use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use harvest_extract::{Verdict, classify};
use harvest_retry::RetryPolicy;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use tokio::fs;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::FetchError;
use crate::filename::{disposition_filename, from_hint, pdf_tail, synthesized};

const USER_AGENT: &str = concat!("harvest/", env!("CARGO_PKG_VERSION"));
const MAX_REDIRECTS: usize = 10;

/// A document written to the staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
  pub url: Url,
  pub path: PathBuf,
  /// Content type the server declared, if any.
  pub content_type: Option<String>,
  pub len: u64,
}

/// Retrieves a URL's bytes outside the browsing session.
#[async_trait]
pub trait Fetcher: Send + Sync {
  /// GET `url` and write the body into `destination`.
  ///
  /// The body is written verbatim; validation is the caller's job.
  async fn fetch_and_stage(
    &self,
    url: &Url,
    destination: &Path,
    filename_hint: Option<&str>,
  ) -> Result<FetchedFile, FetchError>;
}

/// reqwest-backed [`Fetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
  retry: RetryPolicy,
}

struct Response {
  final_url: Url,
  content_type: Option<String>,
  disposition: Option<String>,
  body: Vec<u8>,
}

impl HttpFetcher {
  /// Build a client with redirect following and a per-request timeout.
  pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self, FetchError> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .connect_timeout(timeout.min(Duration::from_secs(10)))
      .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
      .user_agent(USER_AGENT)
      .build()
      .map_err(|e| FetchError::Request {
        url: String::new(),
        message: e.to_string(),
      })?;
    Ok(Self::with_client(client, retry))
  }

  pub fn with_client(client: reqwest::Client, retry: RetryPolicy) -> Self {
    Self { client, retry }
  }

  async fn get(&self, url: &Url) -> Result<Response, FetchError> {
    let response = self
      .client
      .get(url.clone())
      .header(reqwest::header::ACCEPT, "application/pdf,*/*;q=0.8")
      .send()
      .await
      .map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;

    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Status {
        url: url.to_string(),
        status: status.as_u16(),
      });
    }

    let header = |name: reqwest::header::HeaderName| {
      response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
    };
    let content_type = header(CONTENT_TYPE);
    let disposition = header(CONTENT_DISPOSITION);
    let final_url = response.url().clone();

    let body = response
      .bytes()
      .await
      .map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;

    Ok(Response {
      final_url,
      content_type,
      disposition,
      body: body.to_vec(),
    })
  }
}

/// Choose the staged file name, most specific source first.
fn choose_name(url: &Url, response_url: &Url, disposition: Option<&str>, hint: Option<&str>) -> String {
  hint
    .and_then(from_hint)
    .or_else(|| disposition.and_then(disposition_filename).and_then(|n| from_hint(&n)))
    .or_else(|| pdf_tail(response_url))
    .or_else(|| pdf_tail(url))
    .unwrap_or_else(|| synthesized(url))
}

#[async_trait]
impl Fetcher for HttpFetcher {
  #[instrument(skip(self, destination), fields(url = %url))]
  async fn fetch_and_stage(
    &self,
    url: &Url,
    destination: &Path,
    filename_hint: Option<&str>,
  ) -> Result<FetchedFile, FetchError> {
    let response = self
      .retry
      .run("fetch", FetchError::is_transient, |_| self.get(url))
      .await?;

    let name = choose_name(
      url,
      &response.final_url,
      response.disposition.as_deref(),
      filename_hint,
    );
    fs::create_dir_all(destination).await?;
    let path = destination.join(&name);
    if fs::try_exists(&path).await.unwrap_or(false) {
      debug!(path = %path.display(), "overwriting staged file");
    }
    fs::write(&path, &response.body).await?;

    let len = response.body.len() as u64;
    // Diagnostic only. The orchestrator validates the staged file.
    if classify(response.content_type.as_deref(), &response.body) == Verdict::Invalid {
      warn!(
        len,
        content_type = response.content_type.as_deref().unwrap_or("<none>"),
        final_url = %response.final_url,
        "fetched body does not look like a pdf"
      );
    }
    info!(path = %path.display(), len, "document staged");

    Ok(FetchedFile {
      url: url.clone(),
      path,
      content_type: response.content_type,
      len,
    })
  }
}
