use std::fmt;

use serde::Serialize;

use super::{crawler::CrawlReport, sync::SyncReport};
use crate::models::SyncStatus;

/// What a run did, end to end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
	pub days_seen: u64,
	pub days_skipped: usize,
	pub pools_skipped: usize,
	pub records_found: usize,
	pub batches_attempted: usize,
	pub batches_succeeded: usize,
	pub batches_failed: usize,
	pub status: SyncStatus,
}

impl RunSummary {
	pub fn new(crawl: &CrawlReport, sync: &SyncReport) -> Self {
		RunSummary {
			days_seen: crawl.days_seen,
			days_skipped: crawl.days_skipped.len(),
			pools_skipped: crawl.pools_skipped.len(),
			records_found: crawl.records.len(),
			batches_attempted: sync.batches_attempted,
			batches_succeeded: sync.batches_succeeded,
			batches_failed: sync.failures.len(),
			status: sync.status,
		}
	}

	/// Only an outright failure should make the process exit non-zero.
	pub fn is_failure(&self) -> bool {
		self.status == SyncStatus::Failure
	}

	/// Pretty JSON when `json` is set, the plain-text table otherwise.
	pub fn render(&self, json: bool) -> serde_json::Result<String> {
		if json {
			serde_json::to_string_pretty(self)
		} else {
			Ok(self.to_string())
		}
	}
}

impl fmt::Display for RunSummary {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "days seen:      {} ({} skipped)", self.days_seen, self.days_skipped)?;
		writeln!(f, "pools skipped:  {}", self.pools_skipped)?;
		writeln!(f, "records found:  {}", self.records_found)?;
		writeln!(
			f,
			"batches:        {} attempted, {} succeeded, {} failed",
			self.batches_attempted, self.batches_succeeded, self.batches_failed
		)?;
		write!(f, "status:         {}", self.status)
	}
}
