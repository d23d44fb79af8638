//! Process configuration.
//!
//! Everything is read from the environment once at startup. Numeric values that
//! fail to parse fall back to their defaults with a warning rather than
//! aborting startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use harvest_retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::profile::ProfileSet;
use crate::request::AllowList;

/// Default allow-listed host.
pub const DEFAULT_ALLOWED_HOST: &str = "caleprocure.ca.gov";

/// Hard ceiling for collaborator attempts.
pub const MAX_NAVIGATION_ATTEMPTS: u32 = 5;

/// How many documents a successful strategy tier contributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectMode {
  /// Stop at the first stored document.
  #[default]
  First,
  /// Store every validated candidate of the first successful tier.
  Tier,
}

/// Object storage backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
  #[default]
  S3,
  /// Emulate the object store on the local filesystem.
  Fs,
}

/// Filesystem watcher timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSettings {
  pub timeout: Duration,
  pub poll_interval: Duration,
  pub settle_interval: Duration,
}

impl Default for WatchSettings {
  fn default() -> Self {
    Self {
      timeout: Duration::from_secs(60),
      poll_interval: Duration::from_millis(500),
      settle_interval: Duration::from_millis(1500),
    }
  }
}

/// Browsing collaborator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationSettings {
  /// External command (program followed by arguments), if configured.
  pub command: Option<Vec<String>>,
  pub retry: RetryPolicy,
  /// A collaborator run longer than this is considered stalled.
  pub timeout: Duration,
}

impl Default for NavigationSettings {
  fn default() -> Self {
    Self {
      command: None,
      retry: RetryPolicy::exponential(3, Duration::from_secs(2), Duration::from_secs(30)),
      timeout: Duration::from_secs(900),
    }
  }
}

/// Direct fetch settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
  pub timeout: Duration,
  pub retry: RetryPolicy,
}

impl Default for FetchSettings {
  fn default() -> Self {
    Self {
      timeout: Duration::from_secs(30),
      retry: RetryPolicy::fixed(2, Duration::from_millis(500)),
    }
  }
}

/// Object storage settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
  pub mode: StorageMode,
  /// Root directory for [`StorageMode::Fs`].
  pub root: PathBuf,
  pub region: String,
  pub endpoint_url: Option<String>,
}

/// Which credentials were present at startup. Values are never retained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CredentialStatus {
  pub llm: bool,
  pub storage: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
  pub allowed_hosts: AllowList,
  /// Root under which per-request working directories are created.
  pub work_dir: PathBuf,
  pub watch: WatchSettings,
  pub fetch: FetchSettings,
  pub navigation: NavigationSettings,
  pub profiles: ProfileSet,
  pub collect: CollectMode,
  pub storage: StorageSettings,
  pub credentials: CredentialStatus,
  pub port: u16,
}

impl HarvestConfig {
  /// Defaults rooted at `data_dir`, with no credentials.
  pub fn with_data_dir(data_dir: &Path) -> Self {
    Self {
      allowed_hosts: AllowList::parse(DEFAULT_ALLOWED_HOST),
      work_dir: data_dir.join("downloads"),
      watch: WatchSettings::default(),
      fetch: FetchSettings::default(),
      navigation: NavigationSettings::default(),
      profiles: ProfileSet::default(),
      collect: CollectMode::default(),
      storage: StorageSettings {
        mode: StorageMode::default(),
        root: data_dir.join("objects"),
        region: "us-east-1".to_string(),
        endpoint_url: None,
      },
      credentials: CredentialStatus::default(),
      port: 8000,
    }
  }

  /// Load configuration from the process environment.
  pub fn from_env(data_dir: &Path) -> Result<Self, ConfigError> {
    Self::from_lookup(data_dir, |key| std::env::var(key).ok())
  }

  /// Load configuration through an arbitrary variable lookup.
  pub fn from_lookup<F>(data_dir: &Path, lookup: F) -> Result<Self, ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let mut config = Self::with_data_dir(data_dir);

    if let Some(hosts) = var("HARVEST_ALLOWED_HOSTS") {
      config.allowed_hosts = AllowList::parse(&hosts);
    }
    if let Some(dir) = var("HARVEST_WORK_DIR").or_else(|| var("DISK_DOWNLOAD_DIR")) {
      config.work_dir = PathBuf::from(dir);
    }

    let secs = |key: &str, default: Duration| {
      parse_number(key, var(key)).map(Duration::from_secs).unwrap_or(default)
    };
    let millis = |key: &str, default: Duration| {
      parse_number(key, var(key)).map(Duration::from_millis).unwrap_or(default)
    };

    config.watch.timeout = secs("HARVEST_WATCH_TIMEOUT_SECS", config.watch.timeout);
    config.watch.poll_interval = millis("HARVEST_WATCH_POLL_MS", config.watch.poll_interval);
    config.watch.settle_interval = millis("HARVEST_SETTLE_MS", config.watch.settle_interval);
    config.fetch.timeout = secs("HARVEST_FETCH_TIMEOUT_SECS", config.fetch.timeout);
    config.navigation.timeout = secs("HARVEST_NAV_TIMEOUT_SECS", config.navigation.timeout);

    if let Some(attempts) = parse_number("HARVEST_NAV_ATTEMPTS", var("HARVEST_NAV_ATTEMPTS")) {
      config.navigation.retry.max_attempts =
        u32::try_from(attempts).unwrap_or(u32::MAX).clamp(1, MAX_NAVIGATION_ATTEMPTS);
    }

    config.navigation.command = var("HARVEST_NAVIGATOR_CMD").map(|cmd| {
      cmd
        .split_whitespace()
        .map(str::to_string)
        .collect::<Vec<_>>()
    });

    if let Some(path) = var("HARVEST_PROFILES") {
      config.profiles = ProfileSet::load(Path::new(&path))?;
    }

    config.collect = match var("HARVEST_COLLECT").as_deref() {
      None | Some("first") => CollectMode::First,
      Some("tier") => CollectMode::Tier,
      Some(other) => {
        warn!(value = other, "unknown HARVEST_COLLECT value, using 'first'");
        CollectMode::First
      }
    };

    config.storage.mode = match var("HARVEST_STORAGE_MODE").as_deref() {
      None => StorageMode::S3,
      Some(mode) if mode.eq_ignore_ascii_case("s3") => StorageMode::S3,
      Some(mode) if mode.eq_ignore_ascii_case("fs") => StorageMode::Fs,
      Some(other) => {
        return Err(ConfigError::InvalidRequest {
          message: format!("unknown HARVEST_STORAGE_MODE '{}'", other),
        });
      }
    };
    if let Some(root) = var("HARVEST_STORAGE_ROOT") {
      config.storage.root = PathBuf::from(root);
    }
    if let Some(region) = var("AWS_REGION") {
      config.storage.region = region;
    }
    config.storage.endpoint_url = var("HARVEST_S3_ENDPOINT");

    config.credentials = CredentialStatus {
      llm: var("GEMINI_API_KEY").or_else(|| var("GOOGLE_API_KEY")).is_some(),
      storage: var("AWS_ACCESS_KEY_ID").is_some() && var("AWS_SECRET_ACCESS_KEY").is_some(),
    };

    if let Some(port) = parse_number("PORT", var("PORT")) {
      match u16::try_from(port) {
        Ok(port) => config.port = port,
        Err(_) => warn!(value = port, "PORT out of range, using default"),
      }
    }

    Ok(config)
  }

  /// Fail when a credential required by the configured backends is absent.
  pub fn require_credentials(&self) -> Result<(), ConfigError> {
    if self.navigation.command.is_some() && !self.credentials.llm {
      return Err(ConfigError::MissingCredential {
        name: "GEMINI_API_KEY or GOOGLE_API_KEY".to_string(),
      });
    }
    if self.storage.mode == StorageMode::S3 && !self.credentials.storage {
      return Err(ConfigError::MissingCredential {
        name: "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY".to_string(),
      });
    }
    Ok(())
  }
}

fn parse_number(key: &str, value: Option<String>) -> Option<u64> {
  let value = value?;
  match value.parse::<u64>() {
    Ok(n) => Some(n),
    Err(_) => {
      warn!(key, value = %value, "ignoring non-numeric setting");
      None
    }
  }
}
