use std::path::Path;

use anyhow::{bail, Context, Result};

use super::Settings;
use crate::repository::{RepositoryConfig, RepositoryKind};

const DEFAULT_TEMPLATE: &str = r#"[settings]
mirror_dir = "./mirror"
skel_dir = "./skel"
var_dir = "./var"
architectures = ["amd64"]
threads = 4

# deb URI DISTRIBUTION COMPONENT [COMPONENT ...]
# deb-src URI DISTRIBUTION COMPONENT [COMPONENT ...]
# clean URI False   (disable garbage collection for a single repository)
deb http://deb.debian.org/debian bookworm main contrib non-free
"#;

pub enum LoadOutcome {
	Loaded { settings: Settings, repositories: Vec<RepositoryConfig> },
	CreatedDefault,
}

/// Load the combined settings + repository-list config file, writing a
/// starter template and reporting that instead of a parsed config when the
/// file does not yet exist.
pub async fn load(path: &Path) -> Result<LoadOutcome> {
	if !crate::fs_ext::exists(path).await {
		tokio::fs::write(path, DEFAULT_TEMPLATE)
			.await
			.with_context(|| format!("Failed to write default config to {path:?}"))?;
		return Ok(LoadOutcome::CreatedDefault);
	}

	let contents = tokio::fs::read_to_string(path)
		.await
		.with_context(|| format!("Failed to read config {path:?}"))?;
	let (settings, repositories) = parse(&contents)?;
	Ok(LoadOutcome::Loaded { settings, repositories })
}

pub fn parse(contents: &str) -> Result<(Settings, Vec<RepositoryConfig>)> {
	let mut toml_lines = Vec::new();
	let mut directive_lines = Vec::new();
	let mut in_toml = false;

	for line in contents.lines() {
		let trimmed = line.trim();
		if trimmed.starts_with('[') && !trimmed.starts_with("[arch") {
			in_toml = true;
		}
		if is_directive(trimmed) {
			in_toml = false;
		}

		if in_toml {
			toml_lines.push(line);
		} else {
			directive_lines.push(line);
		}
	}

	let settings: Settings = if toml_lines.is_empty() {
		Settings::default()
	} else {
		#[derive(serde::Deserialize, Default)]
		struct Wrapper {
			#[serde(default)]
			settings: Settings,
		}
		let wrapper: Wrapper =
			toml::from_str(&toml_lines.join("\n")).context("Failed to parse [settings] table")?;
		wrapper.settings
	};

	let mut repositories = Vec::new();
	let mut clean_overrides = Vec::new();

	for line in directive_lines {
		let trimmed = line.trim();
		if trimmed.is_empty() || trimmed.starts_with('#') {
			continue;
		}

		let mut parts = trimmed.split_whitespace();
		let Some(directive) = parts.next() else { continue };
		let rest: Vec<&str> = parts.collect();

		match directive {
			"deb" | "deb-src" => {
				repositories.push(parse_repository_line(directive, &rest)?);
			},
			"clean" => {
				let Some(&uri) = rest.first() else {
					bail!("`clean` directive requires a URI: {trimmed}");
				};
				let enabled = rest.get(1).map(|v| !v.eq_ignore_ascii_case("false")).unwrap_or(false);
				clean_overrides.push((uri.to_string(), enabled));
			},
			_ => bail!("Unrecognized config directive: {trimmed}"),
		}
	}

	for (uri, enabled) in clean_overrides {
		for repo in repositories.iter_mut().filter(|r| r.uri == uri) {
			repo.clean = enabled;
		}
	}

	Ok((settings, repositories))
}

fn is_directive(line: &str) -> bool {
	line.starts_with("deb ") || line.starts_with("deb-src ") || line.starts_with("clean ")
}

fn parse_repository_line(directive: &str, rest: &[&str]) -> Result<RepositoryConfig> {
	let kind = if directive == "deb" { RepositoryKind::Binary } else { RepositoryKind::Source };

	let mut tokens = rest.to_vec();
	let mut architectures = Vec::new();
	if let Some(first) = tokens.first() {
		if let Some(list) = first.strip_prefix("[arch=").and_then(|s| s.strip_suffix(']')) {
			architectures = list.split(',').map(str::to_string).collect();
			tokens.remove(0);
		}
	}

	if tokens.is_empty() {
		bail!("`{directive}` directive requires at least a URI");
	}
	let uri = tokens.remove(0).to_string();

	if tokens.is_empty() || tokens[0] == "/" {
		return Ok(RepositoryConfig {
			kind,
			uri,
			distribution: "/".to_string(),
			components: Vec::new(),
			architectures,
			clean: true,
		});
	}

	let distribution = tokens.remove(0).to_string();
	let components = tokens.into_iter().map(str::to_string).collect();

	Ok(RepositoryConfig { kind, uri, distribution, components, architectures, clean: true })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_settings_table_and_repository_lines() {
		let contents = r#"
[settings]
threads = 8
architectures = ["amd64", "arm64"]

deb http://deb.debian.org/debian bookworm main contrib
deb-src http://deb.debian.org/debian bookworm main
"#;
		let (settings, repos) = parse(contents).unwrap();
		assert_eq!(settings.threads, 8);
		assert_eq!(repos.len(), 2);
		assert_eq!(repos[0].components, vec!["main", "contrib"]);
		assert_eq!(repos[1].kind, RepositoryKind::Source);
	}

	#[test]
	fn clean_directive_disables_matching_repository() {
		let contents = "deb http://example.com/debian bookworm main\nclean http://example.com/debian False\n";
		let (_, repos) = parse(contents).unwrap();
		assert!(!repos[0].clean);
	}

	#[test]
	fn arch_override_is_parsed_out_of_the_deb_line() {
		let contents = "deb [arch=amd64,i386] http://example.com/debian bookworm main\n";
		let (_, repos) = parse(contents).unwrap();
		assert_eq!(repos[0].architectures, vec!["amd64", "i386"]);
		assert_eq!(repos[0].uri, "http://example.com/debian");
	}

	#[test]
	fn flat_repository_line_has_no_components() {
		let contents = "deb http://example.com/debian /\n";
		let (_, repos) = parse(contents).unwrap();
		assert_eq!(repos[0].distribution, "/");
		assert!(repos[0].components.is_empty());
	}

	#[test]
	fn unrecognized_directive_is_an_error() {
		assert!(parse("bogus line here\n").is_err());
	}
}
