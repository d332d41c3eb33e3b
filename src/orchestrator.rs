use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::context::RunContext;
use crate::decompress;
use crate::download::{DownloadJob, DownloaderPool, Transport};
use crate::repository::{Repository, RepositoryConfig};

pub struct Orchestrator<T: Transport + Clone + Send + Sync + 'static> {
	ctx: RunContext,
	repositories: Vec<Repository>,
	pool: DownloaderPool<T>,
}

impl<T: Transport + Clone + Send + Sync + 'static> Orchestrator<T> {
	pub fn new(ctx: RunContext, configs: Vec<RepositoryConfig>, transport: T, show_progress: bool) -> Self {
		let threads = ctx.settings.threads;
		let var_dir = ctx.settings.var_dir.clone();
		Orchestrator {
			repositories: configs.into_iter().map(Repository::new).collect(),
			pool: DownloaderPool::new(transport, threads, var_dir).with_progress(show_progress),
			ctx,
		}
	}

	fn skel_dir(&self) -> &Path { &self.ctx.settings.skel_dir }

	fn mirror_dir(&self) -> &Path { &self.ctx.settings.mirror_dir }

	/// Steps 1-13 of the mirror pipeline this tool's Python predecessor
	/// called `PerformMirroring`: fetch every repository's Release
	/// manifest, work out which indices changed, pull their archive files,
	/// and promote the staged skeleton into the published mirror.
	pub async fn mirror(&mut self) -> Result<()> {
		self.fetch_release_manifests().await?;
		self.plan_indices().await?;
		self.download_index_files().await?;
		self.parse_modified_indices().await?;
		self.collect_files_to_keep().await;
		self.download_archive_files().await?;
		self.promote_skel_to_mirror().await?;
		if !self.ctx.settings.test {
			self.post_mirror_clean().await?;
		}
		Ok(())
	}

	/// The 4-step clean pipeline: re-derive which files every on-disk
	/// repository still references, then delete everything else.
	pub async fn clean(&mut self) -> Result<()> {
		let mirror_dir = self.mirror_dir().to_path_buf();
		for repo in &mut self.repositories {
			if !repo.exists(&mirror_dir).await {
				continue;
			}
			let candidates = repo.release_candidates(&mirror_dir);
			let Some(body) = read_first_existing(&candidates).await? else {
				continue;
			};
			repo.parse_release(
				&body,
				&self.ctx.settings.architectures,
				&self.ctx.settings.languages,
				self.ctx.settings.contents,
			);
		}
		self.collect_files_to_keep().await;
		self.sweep(self.mirror_dir()).await
	}

	/// Fetch each repository's Release manifest, preferring `InRelease` and
	/// falling back to the plain `Release` when a repository doesn't
	/// publish one (`Release.gpg` is a detached signature, not a manifest
	/// body, so it is never used as a fallback source).
	async fn fetch_release_manifests(&mut self) -> Result<()> {
		let mut pending: Vec<usize> = (0..self.repositories.len()).collect();
		for (candidate, filename) in ["InRelease", "Release"].into_iter().enumerate() {
			if pending.is_empty() {
				break;
			}
			let mut jobs = Vec::new();
			let mut owners = Vec::new();
			for &i in &pending {
				let repo = &self.repositories[i];
				let Some(url) = repo.release_urls().into_iter().nth(candidate) else { continue };
				let dest = self.skel_dir().join(repo.config.sanitized_root());
				let dest = if repo.config.is_flat() { dest } else { dest.join("dists").join(&repo.config.distribution) };
				jobs.push(DownloadJob { url, dest: dest.join(filename) });
				owners.push(i);
			}
			let outcomes = self.pool.run(jobs).await?;
			pending = outcomes.iter().zip(owners).filter(|(outcome, _)| !outcome.ok).map(|(_, i)| i).collect();
		}
		Ok(())
	}

	async fn plan_indices(&mut self) -> Result<()> {
		let skel_dir = self.skel_dir().to_path_buf();
		let mirror_dir = self.mirror_dir().to_path_buf();
		for repo in &mut self.repositories {
			let candidates = repo.release_candidates(&skel_dir);
			let Some(body) = read_first_existing(&candidates).await? else {
				continue;
			};
			repo.parse_release(
				&body,
				&self.ctx.settings.architectures,
				&self.ctx.settings.languages,
				self.ctx.settings.contents,
			);
			repo.determine_current_timestamps(&mirror_dir).await?;
		}
		Ok(())
	}

	async fn download_index_files(&mut self) -> Result<()> {
		let mut jobs = Vec::new();
		for repo in &self.repositories {
			for package in repo.packages() {
				let url = format!("{}/{}", repo.config.uri.trim_end_matches('/'), package.filename);
				let dest = self.skel_dir().join(repo.config.sanitized_root()).join(&package.filename);
				jobs.push(DownloadJob { url: format!("{url}.xz"), dest: append_ext(&dest, "xz") });
			}
		}
		self.pool.run(jobs).await?;

		for repo in &self.repositories {
			for package in repo.packages() {
				let dest = self.skel_dir().join(repo.config.sanitized_root()).join(&package.filename);
				if decompress::unzip(&dest).await?.is_none() {
					crate::warn!("No compressed index found for {:?}", dest);
				}
			}
		}

		let skel_dir = self.skel_dir().to_path_buf();
		for repo in &mut self.repositories {
			repo.determine_download_timestamps(&skel_dir).await?;
		}
		Ok(())
	}

	async fn parse_modified_indices(&mut self) -> Result<()> {
		let skel_dir = self.skel_dir().to_path_buf();
		for repo in &mut self.repositories {
			if !repo.modified(self.ctx.force_update(), self.ctx.previous_run_interrupted) {
				continue;
			}
			let paths: Vec<String> = repo.packages().iter().map(|p| p.filename.clone()).collect();
			for path in paths {
				let full = skel_dir.join(repo.config.sanitized_root()).join(&path);
				if let Ok(body) = tokio::fs::read_to_string(&full).await {
					repo.parse_unmodified_index(&path, &body);
				}
			}
		}
		Ok(())
	}

	/// Every archive file an index references, plus the repository's own
	/// Release manifest candidates -- the latter must be kept too or the
	/// next `clean` treats the mirror's just-published `InRelease` as an
	/// orphan and deletes it.
	async fn collect_files_to_keep(&self) {
		for repo in &self.repositories {
			let mut relative: Vec<String> =
				repo.packages().iter().map(|p| format!("{}/{}", repo.config.sanitized_root(), p.filename)).collect();
			relative.extend(
				repo.release_candidates(Path::new(""))
					.into_iter()
					.map(|p| p.to_string_lossy().replace('\\', "/")),
			);
			self.ctx.keep_all(relative).await;
		}
	}

	async fn download_archive_files(&mut self) -> Result<()> {
		let mut jobs = Vec::new();
		for repo in &self.repositories {
			for package in repo.packages() {
				let dest = self.mirror_dir().join(repo.config.sanitized_root()).join(&package.filename);
				if crate::fs_ext::exists(&dest).await && !self.ctx.force_update() {
					continue;
				}
				let url = format!("{}/{}", repo.config.uri.trim_end_matches('/'), package.filename);
				jobs.push(DownloadJob { url, dest });
			}
		}
		self.pool.run(jobs).await?;
		Ok(())
	}

	/// Copy whatever is new under `skel_dir` into `mirror_dir`, matching
	/// mtimes so unchanged index files are never rewritten (and therefore
	/// never look "modified" on the next run).
	async fn promote_skel_to_mirror(&self) -> Result<()> {
		for repo in &self.repositories {
			let skel_root = self.skel_dir().join(repo.config.sanitized_root());
			let mirror_root = self.mirror_dir().join(repo.config.sanitized_root());
			if !crate::fs_ext::exists(&skel_root).await {
				continue;
			}
			for entry in WalkDir::new(&skel_root).into_iter().filter_map(|e| e.ok()) {
				if !entry.file_type().is_file() {
					continue;
				}
				let relative = entry.path().strip_prefix(&skel_root).unwrap();
				let target = mirror_root.join(relative);
				if let Some(parent) = target.parent() {
					tokio::fs::create_dir_all(parent).await?;
				}
				tokio::fs::copy(entry.path(), &target)
					.await
					.with_context(|| format!("Failed to copy {:?} to {target:?}", entry.path()))?;
			}
		}
		Ok(())
	}

	/// Selects repositories that are both clean-eligible and unmodified
	/// this run (plus any sharing a URI prefix with one), re-derives their
	/// still-referenced files from the unchanged indices, and sweeps.
	async fn post_mirror_clean(&mut self) -> Result<()> {
		let mut eligible_uris: HashSet<String> = HashSet::new();
		for repo in &self.repositories {
			if repo.config.clean && repo.modified(self.ctx.force_update(), self.ctx.previous_run_interrupted) {
				eligible_uris.insert(repo.config.uri.clone());
			}
		}
		if eligible_uris.is_empty() {
			return Ok(());
		}

		let mirror_dir = self.mirror_dir().to_path_buf();
		for repo in &mut self.repositories {
			if !eligible_uris.iter().any(|uri| repo.config.uri.starts_with(uri.as_str())) {
				continue;
			}
			let paths: Vec<String> = repo.packages().iter().map(|p| p.filename.clone()).collect();
			for path in paths {
				let full = mirror_dir.join(repo.config.sanitized_root()).join(&path);
				if let Ok(body) = tokio::fs::read_to_string(&full).await {
					repo.parse_unmodified_index(&path, &body);
				}
			}
		}
		self.collect_files_to_keep().await;
		self.sweep(self.mirror_dir()).await
	}

	/// Walk every `clean`-eligible repository's subtree under `root` and
	/// delete whatever is not in the kept-files set, unless running in
	/// test mode.
	async fn sweep(&self, root: &Path) -> Result<()> {
		for repo in &self.repositories {
			if !repo.config.clean {
				continue;
			}
			let repo_root = root.join(repo.config.sanitized_root());
			if !crate::fs_ext::exists(&repo_root).await {
				continue;
			}

			let mut reclaimed = 0u64;
			for entry in WalkDir::new(&repo_root).into_iter().filter_map(|e| e.ok()) {
				if !entry.file_type().is_file() {
					continue;
				}
				let relative = entry
					.path()
					.strip_prefix(root)
					.unwrap_or(entry.path())
					.to_string_lossy()
					.replace('\\', "/");
				if self.ctx.is_kept(&relative).await {
					continue;
				}

				let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
				if self.ctx.settings.test {
					crate::info!("Would remove {} ({})", relative, crate::util::convert_size(size));
				} else {
					tokio::fs::remove_file(entry.path()).await.ok();
					reclaimed += size;
				}
			}
			if reclaimed > 0 {
				crate::info!("Reclaimed {} under {}", crate::util::convert_size(reclaimed), repo_root.display());
			}
		}
		Ok(())
	}
}

fn append_ext(path: &Path, ext: &str) -> PathBuf {
	let mut s = path.as_os_str().to_owned();
	s.push(".");
	s.push(ext);
	PathBuf::from(s)
}

/// Read the first candidate path that exists on disk, in order.
async fn read_first_existing(candidates: &[PathBuf]) -> Result<Option<String>> {
	for candidate in candidates {
		if crate::fs_ext::exists(candidate).await {
			let body = tokio::fs::read_to_string(candidate).await.with_context(|| format!("Failed to read {candidate:?}"))?;
			return Ok(Some(body));
		}
	}
	Ok(None)
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use tempfile::tempdir;

	use super::*;
	use crate::config::Settings;
	use crate::download::transport::FakeTransport;
	use crate::repository::RepositoryKind;

	fn repo_config(uri: &str) -> RepositoryConfig {
		RepositoryConfig {
			kind: RepositoryKind::Binary,
			uri: uri.to_string(),
			distribution: "bookworm".to_string(),
			components: vec!["main".to_string()],
			architectures: vec!["amd64".to_string()],
			clean: true,
		}
	}

	#[tokio::test]
	async fn clean_on_a_repository_with_no_release_on_disk_is_a_no_op() {
		let dir = tempdir().unwrap();
		let mut settings = Settings::default();
		settings.mirror_dir = dir.path().join("mirror");
		settings.skel_dir = dir.path().join("skel");
		settings.var_dir = dir.path().join("var");
		tokio::fs::create_dir_all(&settings.var_dir).await.unwrap();

		let ctx = RunContext::new(settings, false);
		let mut orchestrator =
			Orchestrator::new(ctx, vec![repo_config("http://example.com/debian")], FakeTransport { pages: HashMap::new() }, false);
		orchestrator.clean().await.unwrap();
	}

	/// Every package paragraph in an unmodified index must survive, not
	/// just the last one parsed -- both must end up in `files_to_keep` and
	/// both must actually be fetched.
	#[tokio::test]
	async fn every_package_in_an_unmodified_index_is_kept_and_downloaded() {
		let dir = tempdir().unwrap();
		let mut settings = Settings::default();
		settings.mirror_dir = dir.path().join("mirror");
		settings.skel_dir = dir.path().join("skel");
		settings.var_dir = dir.path().join("var");
		tokio::fs::create_dir_all(&settings.var_dir).await.unwrap();

		let mut pages = HashMap::new();
		pages.insert("http://example.com/debian/pool/main/a.deb".to_string(), b"package a".to_vec());
		pages.insert("http://example.com/debian/pool/main/b.deb".to_string(), b"package b".to_vec());

		let ctx = RunContext::new(settings, false);
		let mut orchestrator = Orchestrator::new(
			ctx,
			vec![repo_config("http://example.com/debian")],
			FakeTransport { pages },
			false,
		);

		let body = "Filename: pool/main/a.deb\nSize: 1\n\nFilename: pool/main/b.deb\nSize: 2\n";
		orchestrator.repositories[0].parse_unmodified_index("dists/bookworm/main/binary-amd64/Packages", body);
		assert_eq!(orchestrator.repositories[0].packages().len(), 2);

		orchestrator.collect_files_to_keep().await;
		assert!(orchestrator.ctx.is_kept("example.com/debian/pool/main/a.deb").await);
		assert!(orchestrator.ctx.is_kept("example.com/debian/pool/main/b.deb").await);

		orchestrator.download_archive_files().await.unwrap();
		assert!(orchestrator.mirror_dir().join("example.com/debian/pool/main/a.deb").exists());
		assert!(orchestrator.mirror_dir().join("example.com/debian/pool/main/b.deb").exists());
	}
}
