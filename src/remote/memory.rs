use std::{
	collections::{BTreeMap, BTreeSet},
	sync::Mutex,
	time::Duration,
};

use super::{RemoteEntry, RemoteError, RemoteFs};

#[derive(Debug, Clone)]
enum Node {
	Dir(Vec<String>),
	File,
}

/// In-memory tree. Children keep insertion order, like a server listing.
#[derive(Debug, Default)]
pub struct MemoryFs {
	nodes: BTreeMap<String, Node>,
	failures: BTreeMap<String, RemoteError>,
	stalled: BTreeSet<String>,
	listed: Mutex<Vec<String>>,
}

impl MemoryFs {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn dir(mut self, path: &str) -> Self {
		self.insert(path, Node::Dir(Vec::new()));
		self
	}

	pub fn file(mut self, path: &str) -> Self {
		self.insert(path, Node::File);
		self
	}

	/// Every listing of `path` fails with `err`.
	pub fn fail(mut self, path: &str, err: RemoteError) -> Self {
		self.failures.insert(path.to_string(), err);
		self
	}

	/// Listing `path` hangs for a minute before answering.
	pub fn stall(mut self, path: &str) -> Self {
		self.stalled.insert(path.to_string());
		self
	}

	/// Paths passed to either listing call, in call order.
	pub fn listed(&self) -> Vec<String> {
		self.listed.lock().unwrap().clone()
	}

	fn insert(&mut self, path: &str, node: Node) {
		if let Some((parent, name)) = path.rsplit_once('/') {
			if !self.nodes.contains_key(parent) {
				self.insert(parent, Node::Dir(Vec::new()));
			}
			if let Some(Node::Dir(children)) = self.nodes.get_mut(parent) {
				if !children.iter().any(|c| c == name) {
					children.push(name.to_string());
				}
			}
		}
		self.nodes.entry(path.to_string()).or_insert(node);
	}

	fn children(&self, path: &str) -> Result<&[String], RemoteError> {
		self.listed.lock().unwrap().push(path.to_string());

		if let Some(err) = self.failures.get(path) {
			return Err(err.clone());
		}
		match self.nodes.get(path) {
			Some(Node::Dir(children)) => Ok(children.as_slice()),
			Some(Node::File) => Err(RemoteError::NotADirectory(path.to_string())),
			None => Err(RemoteError::NotFound(path.to_string())),
		}
	}

	async fn hang_if_stalled(&self, path: &str) {
		if self.stalled.contains(path) {
			tokio::time::sleep(Duration::from_secs(60)).await;
		}
	}
}

impl RemoteFs for MemoryFs {
	async fn list_names(&self, path: &str) -> Result<Vec<String>, RemoteError> {
		self.hang_if_stalled(path).await;
		Ok(self.children(path)?.to_vec())
	}

	async fn list_with_attrs(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
		self.hang_if_stalled(path).await;
		let children = self.children(path)?;
		Ok(children
			.iter()
			.map(|name| RemoteEntry {
				name: name.clone(),
				is_dir: matches!(self.nodes.get(&format!("{path}/{name}")), Some(Node::Dir(_))),
			})
			.collect())
	}
}
