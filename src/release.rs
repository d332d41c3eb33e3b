use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

/// Which checksum family a Release manifest line was listed under. Release
/// files repeat the same file list once per algorithm; SHA256 is preferred
/// when more than one is present for the same path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HashAlgorithm {
	Md5,
	Sha1,
	Sha256,
}

#[derive(Debug, Clone)]
pub struct ReleaseEntry {
	pub size: u64,
	pub algorithm: HashAlgorithm,
	pub checksum: String,
}

/// What an index file path found in a Release manifest actually is, derived
/// from its position in the `dists/<dist>/...` layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexKind {
	BinaryPackages { component: String, architecture: String },
	SourcePackages { component: String },
	Contents { component: String, architecture: String },
	Translation { component: String, language: String },
	Commands { component: String, architecture: String },
	Dep11 { component: String, architecture: String },
	/// `<comp>/binary-<arch>/Release`, the per-architecture sibling of
	/// `Packages` describing that directory, not the top-level manifest.
	BinaryRelease { component: String, architecture: String },
	/// `<comp>/i18n/Index`, the translation directory's own checksum index.
	I18nIndex { component: String },
	/// `by-hash/<algorithm>/<digest>` mirrors of another path; excluded from
	/// the plan entirely unless `by_hash` is enabled.
	ByHash,
	Other,
}

fn section_regex() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| Regex::new(r"^(MD5Sum|SHA1|SHA256):\s*$").unwrap())
}

fn line_regex() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| Regex::new(r"^\s*([0-9a-fA-F]+)\s+([0-9]+)\s+(\S+)\s*$").unwrap())
}

/// Parse the checksum sections of a Release (or InRelease) manifest body
/// into one entry per referenced path, preferring SHA256 over SHA1 over
/// MD5Sum when a path is repeated across sections.
pub fn parse_checksums(body: &str) -> HashMap<String, ReleaseEntry> {
	let mut entries: HashMap<String, ReleaseEntry> = HashMap::new();
	let mut current: Option<HashAlgorithm> = None;

	for line in body.lines() {
		if let Some(caps) = section_regex().captures(line) {
			current = Some(match &caps[1] {
				"MD5Sum" => HashAlgorithm::Md5,
				"SHA1" => HashAlgorithm::Sha1,
				"SHA256" => HashAlgorithm::Sha256,
				_ => unreachable!(),
			});
			continue;
		}

		let Some(algorithm) = current else { continue };
		let Some(caps) = line_regex().captures(line) else {
			current = None;
			continue;
		};

		let checksum = caps[1].to_string();
		let size: u64 = match caps[2].parse() {
			Ok(size) => size,
			Err(_) => continue,
		};
		let path = caps[3].to_string();

		match entries.get(&path) {
			Some(existing) if existing.algorithm >= algorithm => continue,
			_ => {
				entries.insert(path, ReleaseEntry { size, algorithm, checksum });
			},
		}
	}

	entries
}

fn binary_packages() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| Regex::new(r"^(?:(?P<component>[^/]+)/)?binary-(?P<arch>[^/]+)/Packages").unwrap())
}

fn source_packages() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| Regex::new(r"^(?:(?P<component>[^/]+)/)?source/Sources").unwrap())
}

fn contents() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| Regex::new(r"^(?:(?P<component>[^/]+)/)?Contents-(?P<arch>[^.]+)").unwrap())
}

fn translation() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| Regex::new(r"^(?:(?P<component>[^/]+)/)?i18n/Translation-(?P<lang>[^.]+)").unwrap())
}

fn commands() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| Regex::new(r"^(?:(?P<component>[^/]+)/)?(?:i18n/)?cnf/Commands-(?P<arch>[^.]+)").unwrap())
}

fn dep11() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| Regex::new(r"^(?:(?P<component>[^/]+)/)?dep11/(?:Components-(?P<arch>[^.]+)|icons)").unwrap())
}

fn binary_release() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| Regex::new(r"^(?:(?P<component>[^/]+)/)?binary-(?P<arch>[^/]+)/Release$").unwrap())
}

fn i18n_index() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| Regex::new(r"^(?:(?P<component>[^/]+)/)?i18n/Index$").unwrap())
}

/// Classify a Release-listed path into the kind of index it names. Order
/// matters: by-hash mirrors would otherwise also match the section regexes
/// above since they reuse the same basenames under a `by-hash/` directory.
pub fn classify(path: &str) -> IndexKind {
	if path.contains("/by-hash/") {
		return IndexKind::ByHash;
	}
	if let Some(caps) = binary_packages().captures(path) {
		return IndexKind::BinaryPackages {
			component: caps.name("component").map(|m| m.as_str()).unwrap_or("main").to_string(),
			architecture: caps["arch"].to_string(),
		};
	}
	if let Some(caps) = source_packages().captures(path) {
		return IndexKind::SourcePackages {
			component: caps.name("component").map(|m| m.as_str()).unwrap_or("main").to_string(),
		};
	}
	if let Some(caps) = contents().captures(path) {
		return IndexKind::Contents {
			component: caps.name("component").map(|m| m.as_str()).unwrap_or("main").to_string(),
			architecture: caps["arch"].to_string(),
		};
	}
	if let Some(caps) = translation().captures(path) {
		return IndexKind::Translation {
			component: caps.name("component").map(|m| m.as_str()).unwrap_or("main").to_string(),
			language: caps["lang"].to_string(),
		};
	}
	if let Some(caps) = commands().captures(path) {
		return IndexKind::Commands {
			component: caps.name("component").map(|m| m.as_str()).unwrap_or("main").to_string(),
			architecture: caps["arch"].to_string(),
		};
	}
	if let Some(caps) = dep11().captures(path) {
		return IndexKind::Dep11 {
			component: caps.name("component").map(|m| m.as_str()).unwrap_or("main").to_string(),
			architecture: caps.name("arch").map(|m| m.as_str()).unwrap_or("all").to_string(),
		};
	}
	if let Some(caps) = binary_release().captures(path) {
		return IndexKind::BinaryRelease {
			component: caps.name("component").map(|m| m.as_str()).unwrap_or("main").to_string(),
			architecture: caps["arch"].to_string(),
		};
	}
	if let Some(caps) = i18n_index().captures(path) {
		return IndexKind::I18nIndex {
			component: caps.name("component").map(|m| m.as_str()).unwrap_or("main").to_string(),
		};
	}
	IndexKind::Other
}
