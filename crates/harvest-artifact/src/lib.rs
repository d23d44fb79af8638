//! Harvest Artifact
//!
//! Durable storage for validated documents. The [`Store`] trait is the
//! backend seam; [`upload`] derives the object key and writes one local file.
//!
//! Backends:
//! - [`S3Store`]: AWS S3 (or any S3-compatible endpoint)
//! - [`FsStore`]: emulates buckets as directories under a local root
//! - [`MemoryStore`]: in-process map, for tests
//!
//! Every put is a single whole-object write. Writing an existing key replaces
//! the object.

mod fs;
mod memory;
mod s3;
mod upload;

pub use fs::FsStore;
pub use memory::{MemoryStore, StoredObject};
pub use s3::S3Store;
pub use upload::{PDF_CONTENT_TYPE, StoredReference, object_key, upload};

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

/// A boxed stream of bytes for object data.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>;

/// Error type for object storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested object was not found.
  #[error("object not found: {bucket}/{key}")]
  NotFound { bucket: String, key: String },

  /// The key or local path cannot be mapped to an object.
  #[error("invalid object key: {0}")]
  InvalidKey(String),

  /// The storage service rejected or failed the request.
  #[error("storage {operation} failed for {bucket}/{key}: {message}")]
  Remote {
    operation: &'static str,
    bucket: String,
    key: String,
    message: String,
  },

  /// An I/O error occurred.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Object storage trait.
///
/// Implementations provide the actual storage backend. Keys are already
/// normalized by the caller.
#[async_trait]
pub trait Store: Send + Sync {
  /// Retrieve an object.
  async fn get(&self, bucket: &str, key: &str) -> Result<ByteStream, Error>;

  /// Store an object, replacing any previous object under the same key.
  async fn put(&self, bucket: &str, key: &str, data: ByteStream, content_type: &str) -> Result<(), Error>;

  /// Short backend name for logs and health output.
  fn name(&self) -> &'static str;
}

/// Collect a stream into one buffer.
pub async fn collect_bytes(data: ByteStream) -> Result<Bytes, Error> {
  use futures::StreamExt;

  let mut stream = std::pin::pin!(data);
  let mut buf = bytes::BytesMut::new();
  while let Some(chunk) = stream.next().await {
    buf.extend_from_slice(&chunk?);
  }
  Ok(buf.freeze())
}

/// A stream yielding `bytes` once.
pub fn once_stream(bytes: Bytes) -> ByteStream {
  Box::pin(futures::stream::once(async move { Ok(bytes) }))
}
