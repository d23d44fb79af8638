use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream as S3Body;
use tracing::{debug, info};

use crate::{ByteStream, Error, Store, collect_bytes, once_stream};

/// S3-backed object store.
#[derive(Debug, Clone)]
pub struct S3Store {
  client: aws_sdk_s3::Client,
}

impl S3Store {
  /// Build a client from the ambient AWS configuration (environment
  /// credentials, profile, instance metadata).
  ///
  /// A custom `endpoint_url` switches to path-style addressing so
  /// S3-compatible services work.
  pub async fn connect(region: Option<String>, endpoint_url: Option<String>) -> Self {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = region {
      loader = loader.region(aws_sdk_s3::config::Region::new(region));
    }
    let custom_endpoint = endpoint_url.is_some();
    if let Some(endpoint) = endpoint_url {
      loader = loader.endpoint_url(endpoint);
    }
    let shared = loader.load().await;

    let config = aws_sdk_s3::config::Builder::from(&shared)
      .force_path_style(custom_endpoint)
      .build();
    info!(region = ?shared.region(), custom_endpoint, "s3 client configured");
    Self::from_client(aws_sdk_s3::Client::from_conf(config))
  }

  pub fn from_client(client: aws_sdk_s3::Client) -> Self {
    Self { client }
  }
}

fn remote(operation: &'static str, bucket: &str, key: &str, message: String) -> Error {
  Error::Remote {
    operation,
    bucket: bucket.to_string(),
    key: key.to_string(),
    message,
  }
}

#[async_trait]
impl Store for S3Store {
  async fn get(&self, bucket: &str, key: &str) -> Result<ByteStream, Error> {
    let output = match self.client.get_object().bucket(bucket).key(key).send().await {
      Ok(output) => output,
      Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
        return Err(Error::NotFound {
          bucket: bucket.to_string(),
          key: key.to_string(),
        });
      }
      Err(e) => return Err(remote("get_object", bucket, key, DisplayErrorContext(&e).to_string())),
    };

    let data = output
      .body
      .collect()
      .await
      .map_err(|e| remote("get_object", bucket, key, e.to_string()))?;
    Ok(once_stream(data.into_bytes()))
  }

  async fn put(&self, bucket: &str, key: &str, data: ByteStream, content_type: &str) -> Result<(), Error> {
    let bytes = collect_bytes(data).await?;
    let len = bytes.len();

    self
      .client
      .put_object()
      .bucket(bucket)
      .key(key)
      .content_type(content_type)
      .body(S3Body::from(bytes))
      .send()
      .await
      .map_err(|e| remote("put_object", bucket, key, DisplayErrorContext(&e).to_string()))?;

    debug!(bucket, key, bytes = len, content_type, "object uploaded");
    Ok(())
  }

  fn name(&self) -> &'static str {
    "s3"
  }
}
