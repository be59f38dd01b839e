use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
	models::TrackRecord,
	remote::{with_deadline, RemoteError, RemoteFs},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeLevel {
	Day,
	Pool,
}

impl std::fmt::Display for NodeLevel {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			NodeLevel::Day => f.write_str("day"),
			NodeLevel::Pool => f.write_str("pool"),
		}
	}
}

#[derive(Debug, Error)]
pub enum CrawlError {
	#[error("base path unavailable: {path}: {source}")]
	BasePathUnavailable {
		path: String,
		#[source]
		source: RemoteError,
	},

	#[error("{level} unreadable: {path}: {source}")]
	NodeUnreadable {
		level: NodeLevel,
		path: String,
		#[source]
		source: RemoteError,
	},
}

/// Case-insensitive suffix allow-list, stored as lowercase `.ext`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
	suffixes: Vec<String>,
}

impl ExtensionFilter {
	pub fn new<I, S>(extensions: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let suffixes = extensions
			.into_iter()
			.map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
			.filter(|ext| !ext.is_empty())
			.map(|ext| format!(".{ext}"))
			.collect();
		ExtensionFilter { suffixes }
	}

	pub fn matches(&self, filename: &str) -> bool {
		let lower = filename.to_lowercase();
		self.suffixes.iter().any(|suffix| lower.ends_with(suffix.as_str()))
	}

	pub fn is_empty(&self) -> bool {
		self.suffixes.is_empty()
	}
}

impl Default for ExtensionFilter {
	fn default() -> Self {
		ExtensionFilter::new(["mp3", "wav", "zip", "rar"])
	}
}

#[derive(Debug, Clone)]
pub struct CrawlOptions {
	pub base_path: String,
	pub extensions: ExtensionFilter,
	/// Deadline for each individual listing call.
	pub list_timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedNode {
	pub path: String,
	pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
	pub records: Vec<TrackRecord>,
	pub days_seen: u64,
	pub days_skipped: Vec<SkippedNode>,
	pub pools_seen: u64,
	pub pools_skipped: Vec<SkippedNode>,
}

impl CrawlReport {
	fn skip(&mut self, err: CrawlError) {
		// A base path failure never reaches here; it ends the crawl instead.
		if let CrawlError::NodeUnreadable { level, path, source } = err {
			warn!(%level, path = %path, error = %source, "skipping unreadable node");
			let node = SkippedNode { path, reason: source.to_string() };
			match level {
				NodeLevel::Day => self.days_skipped.push(node),
				NodeLevel::Pool => self.pools_skipped.push(node),
			}
		}
	}
}

/// Walk `base/<day>/<pool>/<file>` and collect every allow-listed file.
///
/// Only an unreadable base path fails the crawl. An unreadable day or pool
/// is recorded in the report and the walk carries on with its siblings.
pub async fn crawl<R: RemoteFs>(remote: &R, options: &CrawlOptions) -> Result<CrawlReport, CrawlError> {
	let base = match options.base_path.trim_end_matches('/') {
		"" if options.base_path.starts_with('/') => "/",
		trimmed => trimmed,
	};

	let days = with_deadline(base, options.list_timeout, remote.list_names(base))
		.await
		.map_err(|source| CrawlError::BasePathUnavailable {
			path: base.to_string(),
			source,
		})?;
	info!(base_path = base, days = days.len(), "listed base path");

	let mut report = CrawlReport::default();

	for day in days {
		report.days_seen += 1;
		let day_path = join(base, &day);

		let pools = match list_day(remote, &day_path, options.list_timeout).await {
			Ok(pools) => pools,
			Err(err) => {
				report.skip(err);
				continue;
			}
		};

		let mut found_in_day = 0usize;
		for pool in pools {
			report.pools_seen += 1;
			let pool_path = join(&day_path, &pool);

			match list_pool(remote, &pool_path, &pool, &options.extensions, options.list_timeout).await {
				Ok(records) => {
					found_in_day += records.len();
					report.records.extend(records);
				}
				Err(err) => report.skip(err),
			}
		}

		info!(day = %day, tracks = found_in_day, "day processed");
	}

	if let Some(sample) = report.records.first() {
		info!(filename = %sample.filename, pool = %sample.pool_origin, "sample record");
	}

	Ok(report)
}

fn join(parent: &str, name: &str) -> String {
	if parent.ends_with('/') {
		format!("{parent}{name}")
	} else {
		format!("{parent}/{name}")
	}
}

/// Pool names under a day: directories only, hidden entries dropped.
async fn list_day<R: RemoteFs>(remote: &R, day_path: &str, deadline: Option<Duration>) -> Result<Vec<String>, CrawlError> {
	let entries = with_deadline(day_path, deadline, remote.list_with_attrs(day_path))
		.await
		.map_err(|source| CrawlError::NodeUnreadable {
			level: NodeLevel::Day,
			path: day_path.to_string(),
			source,
		})?;

	Ok(entries
		.into_iter()
		.filter(|e| e.is_dir && !e.name.starts_with('.'))
		.map(|e| e.name)
		.collect())
}

async fn list_pool<R: RemoteFs>(
	remote: &R,
	pool_path: &str,
	pool: &str,
	extensions: &ExtensionFilter,
	deadline: Option<Duration>,
) -> Result<Vec<TrackRecord>, CrawlError> {
	let names = with_deadline(pool_path, deadline, remote.list_names(pool_path))
		.await
		.map_err(|source| CrawlError::NodeUnreadable {
			level: NodeLevel::Pool,
			path: pool_path.to_string(),
			source,
		})?;

	let records: Vec<TrackRecord> = names
		.into_iter()
		.filter(|name| extensions.matches(name))
		.map(|name| {
			let file_path = join(pool_path, &name);
			TrackRecord::new(name, pool, file_path)
		})
		.collect();

	debug!(pool_path, tracks = records.len(), "pool listed");
	Ok(records)
}
