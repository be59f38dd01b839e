use std::{future::Future, time::Duration};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
	confirm::{ConfirmationGate, PendingSync},
	models::{SyncStatus, TrackRecord},
};

pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
	#[error("catalog store unavailable: {0}")]
	Unavailable(String),

	#[error("catalog store rejected batch: {0}")]
	Rejected(String),

	#[error("upsert timed out after {secs}s")]
	TimedOut { secs: u64 },
}

#[derive(Debug, Error)]
pub enum SyncError {
	#[error("batch size must be at least 1")]
	InvalidBatchSize,

	/// `report` still describes the run, with status `Failure`.
	#[error("catalog store unavailable for all {} batches: {last}", .report.batches_attempted)]
	StoreUnavailable { report: SyncReport, last: StoreError },
}

/// Persistent catalog keyed by `file_path`.
pub trait CatalogStore {
	/// Insert-or-update every row of `rows` by `file_path`.
	fn upsert_batch(&self, rows: &[TrackRecord]) -> impl Future<Output = Result<(), StoreError>>;
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
	pub batch_size: usize,
	pub upsert_timeout: Option<Duration>,
}

impl Default for SyncOptions {
	fn default() -> Self {
		SyncOptions {
			batch_size: DEFAULT_BATCH_SIZE,
			upsert_timeout: None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
	pub index: usize,
	pub records: usize,
	pub cause: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
	pub status: SyncStatus,
	pub batches_attempted: usize,
	pub batches_succeeded: usize,
	pub failures: Vec<BatchFailure>,
	pub records_written: usize,
}

impl SyncReport {
	fn idle(status: SyncStatus) -> Self {
		SyncReport {
			status,
			batches_attempted: 0,
			batches_succeeded: 0,
			failures: Vec::new(),
			records_written: 0,
		}
	}
}

/// Contiguous, order-preserving batches of at most `batch_size` records.
pub fn partition(records: &[TrackRecord], batch_size: usize) -> Result<std::slice::Chunks<'_, TrackRecord>, SyncError> {
	if batch_size == 0 {
		return Err(SyncError::InvalidBatchSize);
	}
	Ok(records.chunks(batch_size))
}

/// Write `records` to `store` in batches, after `gate` agrees.
///
/// A failed batch is logged and counted, then the next batch is tried.
/// Only a store that was unreachable for every batch is an error.
pub async fn synchronize<S, G>(
	store: &S,
	records: &[TrackRecord],
	gate: &G,
	options: &SyncOptions,
) -> Result<SyncReport, SyncError>
where
	S: CatalogStore,
	G: ConfirmationGate + ?Sized,
{
	let batches = partition(records, options.batch_size)?;

	if records.is_empty() {
		info!("nothing to sync");
		return Ok(SyncReport::idle(SyncStatus::Success));
	}

	let pending = PendingSync {
		records: records.len(),
		batches: batches.len(),
		sample: records.first().map(|r| r.file_path.clone()),
	};
	if !gate.confirm(&pending) {
		info!(records = records.len(), "sync declined, nothing written");
		return Ok(SyncReport::idle(SyncStatus::Declined));
	}

	let discovered_at = Utc::now();
	let mut report = SyncReport::idle(SyncStatus::Success);
	let mut unavailable = 0usize;
	let mut last_unavailable = None;

	for (index, batch) in batches.enumerate() {
		let rows: Vec<TrackRecord> = batch.iter().map(|r| r.stamped(discovered_at)).collect();
		report.batches_attempted += 1;

		match upsert_with_deadline(store, &rows, options.upsert_timeout).await {
			Ok(()) => {
				report.batches_succeeded += 1;
				report.records_written += rows.len();
				info!(batch = index, records = rows.len(), "batch upserted");
			}
			Err(err) => {
				warn!(batch = index, records = rows.len(), error = %err, "batch upsert failed");
				if matches!(err, StoreError::Unavailable(_)) {
					unavailable += 1;
					last_unavailable = Some(err.clone());
				}
				report.failures.push(BatchFailure {
					index,
					records: rows.len(),
					cause: err.to_string(),
				});
			}
		}
	}

	report.status = status_for(records.len(), report.batches_attempted, report.batches_succeeded);

	if report.batches_succeeded == 0 {
		if let Some(last) = last_unavailable.filter(|_| unavailable == report.batches_attempted) {
			error!(batches = unavailable, "catalog store unavailable for every batch");
			return Err(SyncError::StoreUnavailable { report, last });
		}
	}

	Ok(report)
}

fn status_for(records: usize, attempted: usize, succeeded: usize) -> SyncStatus {
	if records == 0 {
		SyncStatus::Success
	} else if attempted == 0 || succeeded == 0 {
		SyncStatus::Failure
	} else if succeeded == attempted {
		SyncStatus::Success
	} else {
		SyncStatus::Partial
	}
}

async fn upsert_with_deadline<S: CatalogStore>(
	store: &S,
	rows: &[TrackRecord],
	deadline: Option<Duration>,
) -> Result<(), StoreError> {
	match deadline {
		Some(limit) => tokio::time::timeout(limit, store.upsert_batch(rows))
			.await
			.map_err(|_| StoreError::TimedOut { secs: limit.as_secs() })?,
		None => store.upsert_batch(rows).await,
	}
}

#[cfg(test)]
mod tests {
	use std::{
		collections::{BTreeMap, BTreeSet},
		sync::Mutex,
	};

	use super::*;

	/// Catalog keyed by `file_path`, with scripted per-call failures.
	#[derive(Default)]
	struct MemoryCatalog {
		rows: Mutex<BTreeMap<String, TrackRecord>>,
		calls: Mutex<Vec<usize>>,
		failing_calls: BTreeMap<usize, StoreError>,
	}

	impl MemoryCatalog {
		fn failing(calls: impl IntoIterator<Item = (usize, StoreError)>) -> Self {
			MemoryCatalog {
				failing_calls: calls.into_iter().collect(),
				..Default::default()
			}
		}

		fn row_count(&self) -> usize {
			self.rows.lock().unwrap().len()
		}

		fn call_count(&self) -> usize {
			self.calls.lock().unwrap().len()
		}
	}

	impl CatalogStore for MemoryCatalog {
		async fn upsert_batch(&self, rows: &[TrackRecord]) -> Result<(), StoreError> {
			let call = {
				let mut calls = self.calls.lock().unwrap();
				calls.push(rows.len());
				calls.len() - 1
			};
			if let Some(err) = self.failing_calls.get(&call) {
				return Err(err.clone());
			}
			let mut stored = self.rows.lock().unwrap();
			for row in rows {
				stored.insert(row.file_path.clone(), row.clone());
			}
			Ok(())
		}
	}

	fn records(n: usize) -> Vec<TrackRecord> {
		(0..n)
			.map(|i| TrackRecord::new(format!("t{i}.mp3"), "Pool", format!("base/day/Pool/t{i}.mp3")))
			.collect()
	}

	fn batch_of(size: usize) -> SyncOptions {
		SyncOptions { batch_size: size, upsert_timeout: None }
	}

	#[test]
	fn partition_covers_every_record_once_in_order() {
		let recs = records(250);
		let batches: Vec<&[TrackRecord]> = partition(&recs, 100).unwrap().collect();

		assert_eq!(batches.len(), 3);
		assert_eq!(batches.iter().map(|b| b.len()).collect::<Vec<_>>(), vec![100, 100, 50]);
		let flat: Vec<&TrackRecord> = batches.iter().flat_map(|b| b.iter()).collect();
		assert_eq!(flat.len(), 250);
		assert!(flat.iter().zip(recs.iter()).all(|(a, b)| *a == b));
	}

	#[test]
	fn partition_rejects_zero_batch_size() {
		assert!(matches!(partition(&records(3), 0), Err(SyncError::InvalidBatchSize)));
	}

	#[tokio::test]
	async fn empty_input_is_a_successful_no_op() {
		let store = MemoryCatalog::default();

		let report = synchronize(&store, &[], &true, &SyncOptions::default()).await.unwrap();

		assert_eq!(report.status, SyncStatus::Success);
		assert_eq!(report.batches_attempted, 0);
		assert_eq!(store.call_count(), 0);
	}

	#[tokio::test]
	async fn declining_writes_nothing() {
		let store = MemoryCatalog::default();

		let report = synchronize(&store, &records(10), &false, &SyncOptions::default()).await.unwrap();

		assert_eq!(report.status, SyncStatus::Declined);
		assert_eq!(store.call_count(), 0);
		assert_eq!(store.row_count(), 0);
	}

	#[tokio::test]
	async fn repeated_sync_does_not_grow_the_catalog() {
		let store = MemoryCatalog::default();
		let recs = records(230);

		let first = synchronize(&store, &recs, &true, &SyncOptions::default()).await.unwrap();
		let after_first = store.row_count();
		let second = synchronize(&store, &recs, &true, &SyncOptions::default()).await.unwrap();

		assert_eq!(first.status, SyncStatus::Success);
		assert_eq!(second.status, SyncStatus::Success);
		assert_eq!(after_first, 230);
		assert_eq!(store.row_count(), 230);
		assert_eq!(store.call_count(), 6);
	}

	#[tokio::test]
	async fn rows_are_stamped_at_sync_time() {
		let store = MemoryCatalog::default();
		let before = Utc::now();

		synchronize(&store, &records(3), &true, &batch_of(2)).await.unwrap();

		let rows = store.rows.lock().unwrap();
		let stamps: BTreeSet<_> = rows.values().map(|r| r.discovered_at).collect();
		assert_eq!(stamps.len(), 1, "one timestamp per run");
		assert!(stamps.iter().all(|s| s.is_some_and(|t| t >= before)));
	}

	#[tokio::test]
	async fn failed_batch_does_not_stop_the_rest() {
		let store = MemoryCatalog::failing([(1, StoreError::Rejected("constraint".into()))]);

		let report = synchronize(&store, &records(50), &true, &batch_of(10)).await.unwrap();

		assert_eq!(store.call_count(), 5);
		assert_eq!(report.batches_attempted, 5);
		assert_eq!(report.batches_succeeded, 4);
		assert_eq!(report.status, SyncStatus::Partial);
		assert_eq!(report.failures, vec![BatchFailure {
			index: 1,
			records: 10,
			cause: "catalog store rejected batch: constraint".into(),
		}]);
		assert_eq!(store.row_count(), 40);
		assert_eq!(report.records_written, 40);
	}

	#[tokio::test]
	async fn all_batches_rejected_is_failure() {
		let store = MemoryCatalog::failing((0..3).map(|i| (i, StoreError::Rejected("bad".into()))));

		let report = synchronize(&store, &records(25), &true, &batch_of(10)).await.unwrap();

		assert_eq!(report.status, SyncStatus::Failure);
		assert_eq!(report.failures.len(), 3);
	}

	#[tokio::test]
	async fn store_down_for_every_batch_is_an_error() {
		let store = MemoryCatalog::failing((0..2).map(|i| (i, StoreError::Unavailable("refused".into()))));

		let err = synchronize(&store, &records(20), &true, &batch_of(10)).await.unwrap_err();

		assert_eq!(store.call_count(), 2);
		match err {
			SyncError::StoreUnavailable { report, last } => {
				assert_eq!(report.status, SyncStatus::Failure);
				assert_eq!(report.batches_attempted, 2);
				assert_eq!(report.failures.len(), 2);
				assert_eq!(last, StoreError::Unavailable("refused".into()));
			}
			other => panic!("expected StoreUnavailable, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn store_down_for_some_batches_is_partial() {
		let store = MemoryCatalog::failing([(0, StoreError::Unavailable("refused".into()))]);

		let report = synchronize(&store, &records(20), &true, &batch_of(10)).await.unwrap();
		assert_eq!(report.status, SyncStatus::Partial);
	}

	struct StalledStore;

	impl CatalogStore for StalledStore {
		async fn upsert_batch(&self, _rows: &[TrackRecord]) -> Result<(), StoreError> {
			tokio::time::sleep(Duration::from_secs(5)).await;
			Ok(())
		}
	}

	#[tokio::test]
	async fn slow_batch_times_out_like_any_failure() {
		let options = SyncOptions {
			batch_size: 10,
			upsert_timeout: Some(Duration::from_millis(10)),
		};

		let report = synchronize(&StalledStore, &records(5), &true, &options).await.unwrap();

		assert_eq!(report.status, SyncStatus::Failure);
		assert!(report.failures[0].cause.contains("timed out"));
	}

	#[test]
	fn status_rules() {
		assert_eq!(status_for(0, 0, 0), SyncStatus::Success);
		assert_eq!(status_for(5, 0, 0), SyncStatus::Failure);
		assert_eq!(status_for(5, 2, 2), SyncStatus::Success);
		assert_eq!(status_for(5, 2, 1), SyncStatus::Partial);
		assert_eq!(status_for(5, 2, 0), SyncStatus::Failure);
	}
}
