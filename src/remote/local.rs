use std::path::{Path, PathBuf};

use super::{map_io_error, RemoteEntry, RemoteError, RemoteFs};

/// Session over a remote tree that is mounted into the local filesystem
/// (an sshfs or SMB mount of the storage box, for example).
#[derive(Debug, Clone)]
pub struct LocalFs {
	root: PathBuf,
}

impl LocalFs {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		LocalFs { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn resolve(&self, path: &str) -> PathBuf {
		self.root.join(path.trim_start_matches('/'))
	}

	async fn read_dir(&self, path: &str) -> Result<Vec<(String, tokio::fs::DirEntry)>, RemoteError> {
		let full = self.resolve(path);
		let mut dir = tokio::fs::read_dir(&full).await.map_err(|e| map_io_error(e, path))?;

		let mut entries = Vec::new();
		while let Some(entry) = dir.next_entry().await.map_err(|e| map_io_error(e, path))? {
			let name = entry.file_name().to_string_lossy().to_string();
			entries.push((name, entry));
		}
		Ok(entries)
	}
}

impl RemoteFs for LocalFs {
	async fn list_names(&self, path: &str) -> Result<Vec<String>, RemoteError> {
		let entries = self.read_dir(path).await?;
		Ok(entries.into_iter().map(|(name, _)| name).collect())
	}

	async fn list_with_attrs(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
		let entries = self.read_dir(path).await?;

		let mut listed = Vec::with_capacity(entries.len());
		for (name, entry) in entries {
			// Symlinks report their own type here, so a link to a directory
			// is not treated as one.
			let is_dir = entry
				.file_type()
				.await
				.map(|t| t.is_dir())
				.map_err(|e| map_io_error(e, path))?;
			listed.push(RemoteEntry { name, is_dir });
		}
		Ok(listed)
	}
}

#[cfg(test)]
mod tests {
	use std::fs;

	use super::*;

	#[tokio::test]
	async fn lists_names_and_directory_flags() {
		let tmp = tempfile::tempdir().unwrap();
		fs::create_dir_all(tmp.path().join("DJPOOLS/JAN/2024-01-01/BeatportPool")).unwrap();
		fs::write(tmp.path().join("DJPOOLS/JAN/2024-01-01/notes.txt"), "x").unwrap();

		let remote = LocalFs::new(tmp.path());

		let mut names = remote.list_names("DJPOOLS/JAN").await.unwrap();
		names.sort();
		assert_eq!(names, vec!["2024-01-01"]);

		let mut entries = remote.list_with_attrs("DJPOOLS/JAN/2024-01-01").await.unwrap();
		entries.sort_by(|a, b| a.name.cmp(&b.name));
		assert_eq!(
			entries,
			vec![
				RemoteEntry { name: "BeatportPool".into(), is_dir: true },
				RemoteEntry { name: "notes.txt".into(), is_dir: false },
			]
		);
	}

	#[tokio::test]
	async fn leading_slash_stays_under_root() {
		let tmp = tempfile::tempdir().unwrap();
		fs::create_dir_all(tmp.path().join("DJPOOLS")).unwrap();

		let remote = LocalFs::new(tmp.path());
		assert!(remote.list_names("/DJPOOLS").await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn missing_path_is_not_found() {
		let tmp = tempfile::tempdir().unwrap();
		let remote = LocalFs::new(tmp.path());

		let err = remote.list_names("nope").await.unwrap_err();
		assert_eq!(err, RemoteError::NotFound("nope".into()));
	}

	#[tokio::test]
	async fn listing_a_file_fails() {
		let tmp = tempfile::tempdir().unwrap();
		fs::write(tmp.path().join("stray.mp3"), "x").unwrap();
		let remote = LocalFs::new(tmp.path());

		let err = remote.list_with_attrs("stray.mp3").await.unwrap_err();
		assert!(matches!(err, RemoteError::NotADirectory(_) | RemoteError::Io(_)));
	}
}
