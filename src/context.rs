use std::collections::HashSet;

use tokio::sync::Mutex;

use crate::config::Settings;

/// Replaces the module-level globals of the tool this was distilled from
/// (`repositories`, `filesToKeep`, the lock file name) with one value
/// constructed once in `main` and threaded through by reference.
pub struct RunContext {
	pub settings: Settings,
	files_to_keep: Mutex<HashSet<String>>,
	pub previous_run_interrupted: bool,
}

impl RunContext {
	pub fn new(settings: Settings, previous_run_interrupted: bool) -> Self {
		RunContext { settings, files_to_keep: Mutex::new(HashSet::new()), previous_run_interrupted }
	}

	pub fn force_update(&self) -> bool { self.settings.force_update }

	pub async fn keep(&self, relative_path: impl Into<String>) { self.files_to_keep.lock().await.insert(relative_path.into()); }

	pub async fn keep_all(&self, paths: impl IntoIterator<Item = String>) {
		let mut set = self.files_to_keep.lock().await;
		set.extend(paths);
	}

	pub async fn is_kept(&self, relative_path: &str) -> bool { self.files_to_keep.lock().await.contains(relative_path) }

	pub async fn kept_count(&self) -> usize { self.files_to_keep.lock().await.len() }
}
