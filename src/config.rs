//! Run configuration.
//!
//! Loaded from an optional TOML file; command-line flags and their
//! `POOLSYNC_*` environment variables override individual fields.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::{sync::DEFAULT_BATCH_SIZE, CrawlOptions, ExtensionFilter, SyncOptions};

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config {path}: {reason}")]
	Read { path: String, reason: String },

	#[error("invalid config {path}: {reason}")]
	Parse { path: String, reason: String },

	#[error("invalid config: {0}")]
	Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PoolSyncConfig {
	/// Where the storage tree is mounted locally.
	pub mount_root: PathBuf,

	/// Tree root below `mount_root`; days live directly under it.
	pub base_path: String,

	pub batch_size: usize,

	/// Allow-listed extensions, with or without the leading dot.
	pub extensions: Vec<String>,

	/// Per listing call. 0 disables the deadline.
	pub list_timeout_secs: u64,

	/// Per batch upsert. 0 disables the deadline.
	pub upsert_timeout_secs: u64,

	pub database_path: PathBuf,
	pub namespace: String,
	pub database: String,
}

fn default_database_path() -> PathBuf {
	dirs::data_dir()
		.map(|d| d.join("poolsync").join("catalog.db"))
		.unwrap_or_else(|| PathBuf::from("poolsync-catalog.db"))
}

impl Default for PoolSyncConfig {
	fn default() -> Self {
		Self {
			mount_root: PathBuf::from("."),
			base_path: "DJPOOLS/JAN".to_string(),
			batch_size: DEFAULT_BATCH_SIZE,
			extensions: ["mp3", "wav", "zip", "rar"].iter().map(|e| e.to_string()).collect(),
			list_timeout_secs: 30,
			upsert_timeout_secs: 60,
			database_path: default_database_path(),
			namespace: "poolsync".to_string(),
			database: "catalog".to_string(),
		}
	}
}

impl PoolSyncConfig {
	/// Load configuration from a TOML file. Missing keys take defaults.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
			path: path.display().to_string(),
			reason: e.to_string(),
		})?;
		toml::from_str(&content).map_err(|e| ConfigError::Parse {
			path: path.display().to_string(),
			reason: e.to_string(),
		})
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.batch_size == 0 {
			return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
		}
		if self.base_path.trim().is_empty() {
			return Err(ConfigError::Invalid("base_path is empty".into()));
		}
		if ExtensionFilter::new(&self.extensions).is_empty() {
			return Err(ConfigError::Invalid("extensions allow-list is empty".into()));
		}
		Ok(())
	}

	pub fn crawl_options(&self) -> CrawlOptions {
		CrawlOptions {
			base_path: self.base_path.clone(),
			extensions: ExtensionFilter::new(&self.extensions),
			list_timeout: deadline(self.list_timeout_secs),
		}
	}

	pub fn sync_options(&self) -> SyncOptions {
		SyncOptions {
			batch_size: self.batch_size,
			upsert_timeout: deadline(self.upsert_timeout_secs),
		}
	}
}

fn deadline(secs: u64) -> Option<Duration> {
	(secs > 0).then(|| Duration::from_secs(secs))
}
