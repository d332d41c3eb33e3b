use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;

pub const APP_LOCK_FILE: &str = "aptmirror.lock";

/// An advisory exclusive lock on a file in `var_dir`, held for the duration
/// of one run. A leftover lock file found at startup (the process holding
/// it died without releasing) means the previous run was interrupted and
/// nothing on disk can be trusted without a full re-scan.
pub struct AppLock {
	file: File,
	path: PathBuf,
}

impl AppLock {
	/// Acquire the run-wide lock, reporting whether a stale lock file was
	/// already present (the interrupted-run signal).
	pub async fn acquire(var_dir: &Path) -> Result<(Self, bool)> {
		let path = var_dir.join(APP_LOCK_FILE);
		let stale = tokio::fs::try_exists(&path).await.unwrap_or(false);

		let path_clone = path.clone();
		let file = tokio::task::spawn_blocking(move || -> Result<File> {
			let file = std::fs::OpenOptions::new()
				.create(true)
				.write(true)
				.open(&path_clone)
				.with_context(|| format!("Failed to open lock file {path_clone:?}"))?;
			file.lock_exclusive()
				.with_context(|| format!("Failed to acquire lock on {path_clone:?}"))?;
			Ok(file)
		})
		.await??;

		Ok((AppLock { file, path }, stale))
	}

	pub async fn release(self) -> Result<()> {
		let path = self.path.clone();
		tokio::task::spawn_blocking(move || -> Result<()> {
			FileExt::unlock(&self.file)
				.with_context(|| format!("Failed to release lock on {:?}", self.path))
		})
		.await??;
		let _ = tokio::fs::remove_file(&path).await;
		Ok(())
	}
}

/// Per-download crash marker: `Download-lock.<id>` in `var_dir`, created
/// before a worker starts writing to its partial file and removed once the
/// download finishes cleanly. Its body is the destination path of the
/// partial file so a crash can be recovered from by removing exactly that
/// file, not just by logging that *something* was interrupted.
pub struct DownloadMarker {
	path: PathBuf,
}

impl DownloadMarker {
	pub async fn create(var_dir: &Path, id: &str, dest: &Path) -> Result<Self> {
		let path = var_dir.join(format!("Download-lock.{id}"));
		tokio::fs::write(&path, dest.to_string_lossy().as_bytes())
			.await
			.with_context(|| format!("Failed to create crash marker {path:?}"))?;
		Ok(DownloadMarker { path })
	}

	pub async fn clear(self) -> Result<()> {
		tokio::fs::remove_file(&self.path)
			.await
			.with_context(|| format!("Failed to remove crash marker {:?}", self.path))
	}
}

/// A leftover `Download-lock.*` marker found at startup: the crashed
/// download's id, the marker file's own path, and the destination file it
/// names.
pub struct StaleMarker {
	pub id: String,
	pub dest: PathBuf,
	marker_path: PathBuf,
}

impl StaleMarker {
	/// Remove the half-downloaded file the marker points to, then the marker
	/// itself.
	pub async fn discard(&self) -> Result<()> {
		if !self.dest.as_os_str().is_empty() {
			tokio::fs::remove_file(&self.dest).await.ok();
		}
		tokio::fs::remove_file(&self.marker_path).await.ok();
		Ok(())
	}
}

/// Scan `var_dir` for leftover `Download-lock.*` markers from a crashed run.
pub async fn scan_stale_markers(var_dir: &Path) -> Result<Vec<StaleMarker>> {
	let mut markers = Vec::new();
	let mut entries = match tokio::fs::read_dir(var_dir).await {
		Ok(entries) => entries,
		Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(markers),
		Err(err) => return Err(err).with_context(|| format!("Failed to read {var_dir:?}")),
	};

	while let Some(entry) = entries.next_entry().await? {
		if let Some(name) = entry.file_name().to_str() {
			if let Some(id) = name.strip_prefix("Download-lock.") {
				let dest = tokio::fs::read_to_string(entry.path()).await.unwrap_or_default();
				markers.push(StaleMarker { id: id.to_string(), dest: PathBuf::from(dest), marker_path: entry.path() });
			}
		}
	}
	Ok(markers)
}

#[cfg(test)]
mod tests {
	use tempfile::tempdir;

	use super::*;

	#[tokio::test]
	async fn first_acquire_reports_no_stale_lock() {
		let dir = tempdir().unwrap();
		let (lock, stale) = AppLock::acquire(dir.path()).await.unwrap();
		assert!(!stale);
		lock.release().await.unwrap();
	}

	#[tokio::test]
	async fn leftover_lock_file_is_reported_as_stale() {
		let dir = tempdir().unwrap();
		tokio::fs::write(dir.path().join(APP_LOCK_FILE), b"").await.unwrap();
		let (lock, stale) = AppLock::acquire(dir.path()).await.unwrap();
		assert!(stale);
		lock.release().await.unwrap();
	}

	#[tokio::test]
	async fn download_marker_round_trip() {
		let dir = tempdir().unwrap();
		let dest = dir.path().join("Packages.xz");
		let marker = DownloadMarker::create(dir.path(), "123", &dest).await.unwrap();
		let markers = scan_stale_markers(dir.path()).await.unwrap();
		assert_eq!(markers.len(), 1);
		assert_eq!(markers[0].id, "123");
		assert_eq!(markers[0].dest, dest);
		marker.clear().await.unwrap();
		assert!(scan_stale_markers(dir.path()).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn discarding_a_stale_marker_removes_the_partial_file() {
		let dir = tempdir().unwrap();
		let dest = dir.path().join("Packages.xz");
		tokio::fs::write(&dest, b"partial").await.unwrap();
		DownloadMarker::create(dir.path(), "123", &dest).await.unwrap();

		let markers = scan_stale_markers(dir.path()).await.unwrap();
		markers[0].discard().await.unwrap();

		assert!(!dest.exists());
		assert!(scan_stale_markers(dir.path()).await.unwrap().is_empty());
	}
}
