use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::{ByteStream, Error, Store};

/// Filesystem-emulated object store.
///
/// Each object is stored at `{root}/{bucket}/{key}`. Parent directories are
/// created automatically.
#[derive(Debug, Clone)]
pub struct FsStore {
  root: PathBuf,
}

impl FsStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Map bucket and key to a path, refusing anything that would escape the root.
  fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, Error> {
    let relative = Path::new(bucket).join(key);
    let escapes = relative
      .components()
      .any(|c| !matches!(c, Component::Normal(_)));
    if bucket.is_empty() || key.is_empty() || escapes {
      return Err(Error::InvalidKey(format!("{}/{}", bucket, key)));
    }
    Ok(self.root.join(relative))
  }
}

#[async_trait]
impl Store for FsStore {
  async fn get(&self, bucket: &str, key: &str) -> Result<ByteStream, Error> {
    let path = self.object_path(bucket, key)?;
    let file = File::open(&path).await.map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        Error::NotFound {
          bucket: bucket.to_string(),
          key: key.to_string(),
        }
      } else {
        Error::Io(e)
      }
    })?;
    let stream = ReaderStream::new(file).map(|r| r.map_err(Error::Io));
    Ok(Box::pin(stream))
  }

  async fn put(&self, bucket: &str, key: &str, data: ByteStream, content_type: &str) -> Result<(), Error> {
    let path = self.object_path(bucket, key)?;

    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).await?;
    }

    let mut file = File::create(&path).await?;
    let mut stream = std::pin::pin!(data);
    let mut written = 0usize;

    while let Some(chunk) = stream.next().await {
      let bytes = chunk?;
      written += bytes.len();
      file.write_all(&bytes).await?;
    }

    file.flush().await?;
    debug!(path = %path.display(), bytes = written, content_type, "object written");
    Ok(())
  }

  fn name(&self) -> &'static str {
    "fs"
  }
}
