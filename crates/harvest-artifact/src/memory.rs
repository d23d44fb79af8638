use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{ByteStream, Error, Store, collect_bytes, once_stream};

/// An object held by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
  pub bytes: Bytes,
  pub content_type: String,
}

/// In-memory object store.
///
/// Counts every put attempt and can be told to fail a number of puts first.
#[derive(Debug, Default)]
pub struct MemoryStore {
  objects: Mutex<BTreeMap<(String, String), StoredObject>>,
  puts: AtomicUsize,
  failures_left: AtomicUsize,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// A store whose first `count` puts fail.
  pub fn failing(count: usize) -> Self {
    Self {
      failures_left: AtomicUsize::new(count),
      ..Self::default()
    }
  }

  /// Number of put calls, including failed ones.
  pub fn put_count(&self) -> usize {
    self.puts.load(Ordering::SeqCst)
  }

  pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
    self
      .objects
      .lock()
      .ok()?
      .get(&(bucket.to_string(), key.to_string()))
      .cloned()
  }

  /// All `(bucket, key)` pairs, sorted.
  pub fn keys(&self) -> Vec<(String, String)> {
    self
      .objects
      .lock()
      .map(|objects| objects.keys().cloned().collect())
      .unwrap_or_default()
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn get(&self, bucket: &str, key: &str) -> Result<ByteStream, Error> {
    match self.object(bucket, key) {
      Some(object) => Ok(once_stream(object.bytes)),
      None => Err(Error::NotFound {
        bucket: bucket.to_string(),
        key: key.to_string(),
      }),
    }
  }

  async fn put(&self, bucket: &str, key: &str, data: ByteStream, content_type: &str) -> Result<(), Error> {
    self.puts.fetch_add(1, Ordering::SeqCst);

    let fail = self
      .failures_left
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .is_ok();
    if fail {
      return Err(Error::Remote {
        operation: "put_object",
        bucket: bucket.to_string(),
        key: key.to_string(),
        message: "injected failure".to_string(),
      });
    }

    let bytes = collect_bytes(data).await?;
    let mut objects = self.objects.lock().map_err(|_| Error::Remote {
      operation: "put_object",
      bucket: bucket.to_string(),
      key: key.to_string(),
      message: "store lock poisoned".to_string(),
    })?;
    objects.insert(
      (bucket.to_string(), key.to_string()),
      StoredObject {
        bytes,
        content_type: content_type.to_string(),
      },
    );
    Ok(())
  }

  fn name(&self) -> &'static str {
    "memory"
  }
}
