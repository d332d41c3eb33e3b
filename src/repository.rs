use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::collection::IndexCollection;
use crate::index::{self, Package};
use crate::release::{self, IndexKind};
use crate::uri;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryKind {
	Binary,
	Source,
}

/// One `deb`/`deb-src` line from the config file.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
	pub kind: RepositoryKind,
	pub uri: String,
	pub distribution: String,
	pub components: Vec<String>,
	/// Architectures this repository should mirror; empty means "use the
	/// global `[settings]` architecture list".
	pub architectures: Vec<String>,
	/// Whether garbage collection is allowed to remove this repository's
	/// stale files. Disabled by a matching `clean URI False` line.
	pub clean: bool,
}

impl RepositoryConfig {
	pub fn sanitized_root(&self) -> String { uri::sanitize(&self.uri) }

	/// `dists/<distribution>` is flat-repository-free territory; a
	/// distribution of "/" (as written for a flat repo, `deb URI / COMP`)
	/// mirrors directly at the repository root instead.
	pub fn is_flat(&self) -> bool { self.distribution == "/" || self.distribution.is_empty() }
}

/// A binary archive file keyed by where it is listed: component,
/// architecture, and its path within the repository.
pub type BinaryKey = (String, String, String);
/// A source archive file keyed by component and path.
pub type SourceKey = (String, String);

pub enum IndexEntries {
	Binary(IndexCollection<BinaryKey>),
	Source(IndexCollection<SourceKey>),
}

pub struct Repository {
	pub config: RepositoryConfig,
	pub entries: IndexEntries,
}

impl Repository {
	pub fn new(config: RepositoryConfig) -> Self {
		let entries = match config.kind {
			RepositoryKind::Binary => IndexEntries::Binary(IndexCollection::new()),
			RepositoryKind::Source => IndexEntries::Source(IndexCollection::new()),
		};
		Repository { config, entries }
	}

	/// Resolves the `RepositoryType.Src`-vs-property-access mixup the
	/// original classifier had: a single accessor, checked for both
	/// branches everywhere a repository's kind matters.
	pub fn kind(&self) -> RepositoryKind { self.config.kind }

	/// Candidate Release manifest URLs for this repository, tried in order;
	/// `InRelease` is the signed, single-file form and preferred when
	/// present.
	pub fn release_urls(&self) -> Vec<String> {
		let base = if self.config.is_flat() {
			self.config.uri.trim_end_matches('/').to_string()
		} else {
			format!("{}/dists/{}", self.config.uri.trim_end_matches('/'), self.config.distribution)
		};
		vec![format!("{base}/InRelease"), format!("{base}/Release"), format!("{base}/Release.gpg")]
	}

	fn release_dir(&self, mirror_root: &Path) -> PathBuf {
		let root = mirror_root.join(self.config.sanitized_root());
		if self.config.is_flat() {
			root
		} else {
			root.join("dists").join(&self.config.distribution)
		}
	}

	pub fn release_path(&self, mirror_root: &Path) -> PathBuf { self.release_dir(mirror_root).join("InRelease") }

	/// On-disk Release manifest filenames to try, in the same
	/// InRelease-then-Release preference order as `release_urls()`.
	pub fn release_candidates(&self, root: &Path) -> Vec<PathBuf> {
		let dir = self.release_dir(root);
		vec![dir.join("InRelease"), dir.join("Release")]
	}

	/// Whether this repository has ever been mirrored at all -- its
	/// sanitized root directory exists -- rather than whether one specific
	/// manifest filename happens to be present under it.
	pub async fn exists(&self, mirror_root: &Path) -> bool {
		crate::fs_ext::exists(mirror_root.join(self.config.sanitized_root())).await
	}

	/// Parse a Release manifest body and populate this repository's entries
	/// with the archive files it names, restricted to the configured
	/// components/architectures/languages.
	pub fn parse_release(
		&mut self,
		body: &str,
		global_architectures: &[String],
		languages: &[String],
		include_contents: bool,
	) {
		let architectures = if self.config.architectures.is_empty() {
			global_architectures
		} else {
			&self.config.architectures
		};

		for (path, release_entry) in release::parse_checksums(body) {
			if !matches_selection(
				&release::classify(&path),
				&self.config.components,
				architectures,
				languages,
				include_contents,
			) {
				continue;
			}

			let index_path = format!(
				"{}/{}",
				if self.config.is_flat() {
					String::new()
				} else {
					format!("dists/{}", self.config.distribution)
				},
				path
			);
			let index_path = index_path.trim_start_matches('/').to_string();

			match (&mut self.entries, release::classify(&path)) {
				(IndexEntries::Binary(collection), IndexKind::BinaryPackages { component, architecture }) => {
					collection.add(
						(component, architecture, index_path.clone()),
						Package { filename: index_path, size: release_entry.size, latest: false },
					);
				},
				(IndexEntries::Source(collection), IndexKind::SourcePackages { component }) => {
					collection.add(
						(component, index_path.clone()),
						Package { filename: index_path, size: release_entry.size, latest: false },
					);
				},
				(
					IndexEntries::Binary(collection),
					IndexKind::BinaryRelease { component, architecture } | IndexKind::Commands { component, architecture },
				) => {
					collection.add(
						(component, architecture, index_path.clone()),
						Package { filename: index_path, size: release_entry.size, latest: false },
					);
				},
				(
					IndexEntries::Binary(collection),
					IndexKind::I18nIndex { component } | IndexKind::Dep11 { component, .. },
				) => {
					collection.add(
						(component, "all".to_string(), index_path.clone()),
						Package { filename: index_path, size: release_entry.size, latest: false },
					);
				},
				_ => {},
			}
		}
	}

	pub fn modified(&self, force: bool, interrupted: bool) -> bool {
		match &self.entries {
			IndexEntries::Binary(collection) => !collection.modified_keys(force, interrupted).is_empty(),
			IndexEntries::Source(collection) => !collection.modified_keys(force, interrupted).is_empty(),
		}
	}

	pub async fn determine_current_timestamps(&mut self, mirror_root: &Path) -> Result<()> {
		match &mut self.entries {
			IndexEntries::Binary(collection) => collection.determine_current_timestamps(mirror_root).await,
			IndexEntries::Source(collection) => collection.determine_current_timestamps(mirror_root).await,
		}
	}

	pub async fn determine_download_timestamps(&mut self, mirror_root: &Path) -> Result<()> {
		match &mut self.entries {
			IndexEntries::Binary(collection) => collection.determine_download_timestamps(mirror_root).await,
			IndexEntries::Source(collection) => collection.determine_download_timestamps(mirror_root).await,
		}
	}

	pub fn packages(&self) -> Vec<&Package> {
		match &self.entries {
			IndexEntries::Binary(collection) => collection.packages().collect(),
			IndexEntries::Source(collection) => collection.packages().collect(),
		}
	}

	/// Re-derive the package list for an index file this repository did
	/// not need to re-download, so its files are still counted as
	/// in-use during garbage collection. Every package paragraph in the
	/// index gets its own key -- keying on the index's own path instead of
	/// the package's filename would collapse every package in the file
	/// down to whichever one was inserted last.
	pub fn parse_unmodified_index(&mut self, _relative_path: &str, body: &str) {
		let component = self.config.components.first().cloned().unwrap_or_else(|| "main".to_string());
		match &mut self.entries {
			IndexEntries::Binary(collection) => {
				for paragraph in index::parse_paragraphs(body) {
					if let Some(pkg) = index::from_binary_paragraph(&paragraph) {
						collection.add((component.clone(), "all".to_string(), pkg.filename.clone()), pkg);
					}
				}
			},
			IndexEntries::Source(collection) => {
				for paragraph in index::parse_paragraphs(body) {
					for pkg in index::from_source_paragraph(&paragraph) {
						collection.add((component.clone(), pkg.filename.clone()), pkg);
					}
				}
			},
		}
	}
}

fn matches_selection(
	kind: &IndexKind,
	components: &[String],
	architectures: &[String],
	languages: &[String],
	include_contents: bool,
) -> bool {
	match kind {
		IndexKind::BinaryPackages { component, architecture } => {
			components.iter().any(|c| c == component) && architectures.iter().any(|a| a == architecture)
		},
		IndexKind::SourcePackages { component } => components.iter().any(|c| c == component),
		IndexKind::Contents { component, .. } => include_contents && components.iter().any(|c| c == component),
		IndexKind::Translation { component, language } => {
			components.iter().any(|c| c == component) && languages.iter().any(|l| l == language)
		},
		IndexKind::BinaryRelease { component, architecture } | IndexKind::Commands { component, architecture } => {
			components.iter().any(|c| c == component) && architectures.iter().any(|a| a == architecture)
		},
		IndexKind::I18nIndex { component } | IndexKind::Dep11 { component, .. } => {
			components.iter().any(|c| c == component)
		},
		IndexKind::ByHash | IndexKind::Other => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn config(kind: RepositoryKind) -> RepositoryConfig {
		RepositoryConfig {
			kind,
			uri: "http://example.com/debian".to_string(),
			distribution: "stable".to_string(),
			components: vec!["main".to_string()],
			architectures: vec!["amd64".to_string()],
			clean: true,
		}
	}

	#[test]
	fn release_urls_prefer_inrelease_first() {
		let repo = Repository::new(config(RepositoryKind::Binary));
		let urls = repo.release_urls();
		assert!(urls[0].ends_with("/InRelease"));
		assert!(urls[1].ends_with("/Release"));
	}

	#[test]
	fn flat_repository_skips_dists_segment() {
		let mut cfg = config(RepositoryKind::Binary);
		cfg.distribution = "/".to_string();
		let repo = Repository::new(cfg);
		assert!(repo.release_urls()[0].contains("/debian/InRelease"));
		assert!(!repo.release_urls()[0].contains("dists"));
	}

	#[test]
	fn parse_release_only_keeps_configured_component_and_arch() {
		let mut repo = Repository::new(config(RepositoryKind::Binary));
		let body = "SHA256:\n abc 1 main/binary-amd64/Packages.xz\n def 1 main/binary-i386/Packages.xz\n ghi 1 extra/binary-amd64/Packages.xz\n";
		repo.parse_release(body, &["amd64".to_string()], &["en".to_string()], false);
		assert_eq!(repo.packages().len(), 1);
	}

	#[test]
	fn always_emitted_auxiliary_indices_are_kept_for_a_configured_component() {
		let mut repo = Repository::new(config(RepositoryKind::Binary));
		let body = "SHA256:\n\
			 aaa1 1 main/binary-amd64/Release\n\
			 aaa2 1 main/cnf/Commands-amd64\n\
			 aaa3 1 main/i18n/cnf/Commands-amd64\n\
			 aaa4 1 main/i18n/Index\n\
			 aaa5 1 main/dep11/Components-amd64.yml\n\
			 aaa6 1 other/binary-amd64/Release\n";
		repo.parse_release(body, &["amd64".to_string()], &["en".to_string()], false);
		assert_eq!(repo.packages().len(), 5);
	}

	#[test]
	fn kind_accessor_matches_configured_kind_for_both_branches() {
		assert_eq!(Repository::new(config(RepositoryKind::Binary)).kind(), RepositoryKind::Binary);
		assert_eq!(Repository::new(config(RepositoryKind::Source)).kind(), RepositoryKind::Source);
	}
}
