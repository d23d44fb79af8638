//! Harvest Config
//!
//! Configuration types for the document harvester:
//! - [`HarvestConfig`]: process-wide settings loaded from the environment
//! - [`ExtractionRequest`]: one extraction job, validated against an [`AllowList`]
//! - [`HostProfile`]: per-site instruction and URL templates
//!
//! Requests never proceed past [`ExtractionRequest::authorize`] unless their host
//! is allow-listed.

mod config;
mod error;
mod profile;
mod request;

pub use config::{
  CollectMode, CredentialStatus, DEFAULT_ALLOWED_HOST, FetchSettings, HarvestConfig,
  MAX_NAVIGATION_ATTEMPTS, NavigationSettings, StorageMode, StorageSettings, WatchSettings,
};
pub use error::ConfigError;
pub use harvest_retry::{RetryBackoff, RetryPolicy};
pub use profile::{DEFAULT_INSTRUCTIONS, DEFAULT_MAX_CONSTRUCTED, HostProfile, ProfileSet};
pub use request::{AllowList, ExtractionRequest};
