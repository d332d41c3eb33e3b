use std::collections::HashMap;
use std::hash::Hash;
use std::path::Path;

use anyhow::Result;

use crate::fs_ext::AsyncFs;
use crate::index::Package;
use crate::timestamp::Timestamp;

struct Entry {
	package: Package,
	timestamp: Timestamp,
}

/// A keyed set of archive-file records together with their before/after
/// download timestamps. `BinaryCollection` keys on (component, architecture,
/// path); `SourceCollection` keys on (component, path) -- both are just this
/// collection instantiated with a different key type.
pub struct IndexCollection<K> {
	entries: HashMap<K, Entry>,
}

impl<K: Eq + Hash + Clone> Default for IndexCollection<K> {
	fn default() -> Self { Self { entries: HashMap::new() } }
}

impl<K: Eq + Hash + Clone> IndexCollection<K> {
	pub fn new() -> Self { Self::default() }

	pub fn add(&mut self, key: K, package: Package) {
		self.entries.insert(key, Entry { package, timestamp: Timestamp::new() });
	}

	pub fn get(&self, key: &K) -> Option<&Package> { self.entries.get(key).map(|e| &e.package) }

	pub fn packages(&self) -> impl Iterator<Item = &Package> { self.entries.values().map(|e| &e.package) }

	pub fn is_empty(&self) -> bool { self.entries.is_empty() }

	pub fn len(&self) -> usize { self.entries.len() }

	/// Stat each entry's archive file under `base_dir` and record its
	/// current mtime, before any download runs.
	pub async fn determine_current_timestamps(&mut self, base_dir: &Path) -> Result<()> {
		for entry in self.entries.values_mut() {
			let path = base_dir.join(&entry.package.filename);
			if crate::fs_ext::exists(&path).await {
				entry.timestamp.set_current(path.mtime().await?);
			}
		}
		Ok(())
	}

	/// Stat each entry's archive file again after a download pass, to learn
	/// which ones actually changed on disk. An entry whose file the
	/// downloader never produced is dropped outright rather than left
	/// behind to be treated as unmodified.
	pub async fn determine_download_timestamps(&mut self, base_dir: &Path) -> Result<()> {
		let mut missing = Vec::new();
		for (key, entry) in self.entries.iter_mut() {
			let path = base_dir.join(&entry.package.filename);
			if crate::fs_ext::exists(&path).await {
				entry.timestamp.set_downloaded(path.mtime().await?);
			} else {
				missing.push(key.clone());
			}
		}
		for key in missing {
			self.entries.remove(&key);
		}
		Ok(())
	}

	/// Keys whose archive file should be treated as modified: either its
	/// timestamp genuinely changed, the previous run was interrupted (so
	/// nothing can be trusted), or the caller forced a full refresh.
	pub fn modified_keys(&self, force: bool, interrupted: bool) -> Vec<&K> {
		self.entries
			.iter()
			.filter(|(_, entry)| force || interrupted || entry.timestamp.modified())
			.map(|(key, _)| key)
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use tempfile::tempdir;

	use super::*;

	fn pkg(filename: &str, size: u64) -> Package {
		Package { filename: filename.to_string(), size, latest: false }
	}

	#[tokio::test]
	async fn entries_absent_on_disk_stay_unmodified_until_forced() {
		let dir = tempdir().unwrap();
		let mut collection: IndexCollection<&str> = IndexCollection::new();
		collection.add("a", pkg("a.deb", 1));

		collection.determine_current_timestamps(dir.path()).await.unwrap();
		assert!(collection.modified_keys(false, false).is_empty());
		assert_eq!(collection.modified_keys(true, false).len(), 1);
	}

	#[tokio::test]
	async fn downloaded_file_is_detected_as_modified() {
		let dir = tempdir().unwrap();
		let mut collection: IndexCollection<&str> = IndexCollection::new();
		collection.add("a", pkg("a.deb", 1));

		collection.determine_current_timestamps(dir.path()).await.unwrap();

		let path = dir.path().join("a.deb");
		tokio::fs::write(&path, b"x").await.unwrap();
		filetime::set_file_mtime(&path, filetime::FileTime::from_unix_time(9999999, 0)).unwrap();

		collection.determine_download_timestamps(dir.path()).await.unwrap();
		assert_eq!(collection.modified_keys(false, false).len(), 1);
	}

	#[tokio::test]
	async fn entry_missing_after_download_is_pruned_from_the_collection() {
		let dir = tempdir().unwrap();
		let mut collection: IndexCollection<&str> = IndexCollection::new();
		collection.add("a", pkg("a.deb", 1));
		collection.add("b", pkg("b.deb", 1));

		tokio::fs::write(dir.path().join("b.deb"), b"x").await.unwrap();

		collection.determine_current_timestamps(dir.path()).await.unwrap();
		collection.determine_download_timestamps(dir.path()).await.unwrap();

		assert_eq!(collection.len(), 1);
		assert!(collection.get(&"b").is_some());
		assert!(collection.get(&"a").is_none());
	}

	#[test]
	fn interrupted_run_forces_every_entry_modified() {
		let mut collection: IndexCollection<&str> = IndexCollection::new();
		collection.add("a", pkg("a.deb", 1));
		collection.add("b", pkg("b.deb", 1));
		assert_eq!(collection.modified_keys(false, true).len(), 2);
	}
}
