use std::fmt;
use std::path::Path;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{info, instrument};

use crate::{Error, Store};

/// MIME type every stored document is written with.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Durable location of an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoredReference {
  pub bucket: String,
  pub key: String,
}

impl StoredReference {
  /// Canonical `s3://bucket/key` form.
  pub fn uri(&self) -> String {
    self.to_string()
  }
}

impl fmt::Display for StoredReference {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "s3://{}/{}", self.bucket, self.key)
  }
}

/// Object key for `file_name` under `prefix`.
///
/// Leading and trailing separators are stripped from the prefix; an empty
/// prefix yields the bare file name.
pub fn object_key(prefix: &str, file_name: &str) -> String {
  let prefix = prefix.trim().trim_matches('/');
  if prefix.is_empty() {
    file_name.to_string()
  } else {
    format!("{}/{}", prefix, file_name)
  }
}

/// Upload one local file as `prefix/basename(local_path)`.
#[instrument(skip(store), fields(store = store.name(), path = %local_path.display()))]
pub async fn upload(
  store: &dyn Store,
  local_path: &Path,
  bucket: &str,
  prefix: &str,
) -> Result<StoredReference, Error> {
  let file_name = local_path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .filter(|n| !n.is_empty())
    .ok_or_else(|| Error::InvalidKey(local_path.display().to_string()))?;
  let key = object_key(prefix, &file_name);

  let file = File::open(local_path).await?;
  let len = file.metadata().await?.len();
  let stream = ReaderStream::new(file).map(|r| r.map_err(Error::Io));

  store.put(bucket, &key, Box::pin(stream), PDF_CONTENT_TYPE).await?;

  let reference = StoredReference {
    bucket: bucket.to_string(),
    key,
  };
  info!(reference = %reference, bytes = len, "document stored");
  Ok(reference)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_object_key() {
    assert_eq!(object_key("folder/sub/", "report.pdf"), "folder/sub/report.pdf");
    assert_eq!(object_key("/folder/sub", "report.pdf"), "folder/sub/report.pdf");
    assert_eq!(object_key("", "report.pdf"), "report.pdf");
    assert_eq!(object_key("/", "report.pdf"), "report.pdf");
  }

  #[test]
  fn test_reference_display() {
    let reference = StoredReference {
      bucket: "bucket1".to_string(),
      key: "folder/sub/report.pdf".to_string(),
    };
    assert_eq!(reference.uri(), "s3://bucket1/folder/sub/report.pdf");
  }
}
