//! Remote filesystem session seam.
//!
//! The crawler only ever needs two listing calls, so that is all a session
//! has to provide. Connecting and authenticating is the session's business.

use std::{future::Future, io, time::Duration};

use thiserror::Error;

pub mod local;
#[cfg(test)]
pub mod memory;

pub use local::LocalFs;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
	#[error("not found: {0}")]
	NotFound(String),

	#[error("permission denied: {0}")]
	PermissionDenied(String),

	#[error("not a directory: {0}")]
	NotADirectory(String),

	#[error("listing {path} timed out after {secs}s")]
	TimedOut { path: String, secs: u64 },

	#[error("I/O error: {0}")]
	Io(String),
}

/// One entry of an attribute listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
	pub name: String,
	pub is_dir: bool,
}

/// A connected session on the remote tree. Paths are `/`-joined and
/// relative to whatever root the session was opened on.
pub trait RemoteFs {
	/// Names directly under `path`, in the order the server returns them.
	fn list_names(&self, path: &str) -> impl Future<Output = Result<Vec<String>, RemoteError>>;

	/// Entries directly under `path` with their directory flag.
	fn list_with_attrs(&self, path: &str) -> impl Future<Output = Result<Vec<RemoteEntry>, RemoteError>>;
}

/// Run a listing call under an optional deadline. An expired deadline is
/// reported as [`RemoteError::TimedOut`].
pub async fn with_deadline<T, F>(path: &str, deadline: Option<Duration>, call: F) -> Result<T, RemoteError>
where
	F: Future<Output = Result<T, RemoteError>>,
{
	match deadline {
		Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| RemoteError::TimedOut {
			path: path.to_string(),
			secs: limit.as_secs(),
		})?,
		None => call.await,
	}
}

pub(crate) fn map_io_error(err: io::Error, path: &str) -> RemoteError {
	match err.kind() {
		io::ErrorKind::NotFound => RemoteError::NotFound(path.to_string()),
		io::ErrorKind::PermissionDenied => RemoteError::PermissionDenied(path.to_string()),
		io::ErrorKind::NotADirectory => RemoteError::NotADirectory(path.to_string()),
		_ => RemoteError::Io(format!("{path}: {err}")),
	}
}
