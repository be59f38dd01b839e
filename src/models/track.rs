use chrono::{DateTime, Utc};
use serde::Serialize;

/// One audio or archive file discovered under `base/day/pool/`.
/// `file_path` is the identity key in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRecord {
    pub filename: String,
    pub pool_origin: String,
    pub file_path: String,
    /// Assigned by the synchronizer, never by the crawler.
    pub discovered_at: Option<DateTime<Utc>>,
}

impl TrackRecord {
    pub fn new(filename: impl Into<String>, pool_origin: impl Into<String>, file_path: impl Into<String>) -> Self {
        TrackRecord {
            filename: filename.into(),
            pool_origin: pool_origin.into(),
            file_path: file_path.into(),
            discovered_at: None,
        }
    }

    pub fn stamped(&self, at: DateTime<Utc>) -> Self {
        TrackRecord {
            discovered_at: Some(at),
            ..self.clone()
        }
    }
}

/// Final outcome of a sync run.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Partial,
    Failure,
    Declined,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncStatus::Success => "success",
            SyncStatus::Partial => "partial",
            SyncStatus::Failure => "failure",
            SyncStatus::Declined => "declined",
        };
        f.write_str(s)
    }
}
