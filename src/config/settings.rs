use std::path::PathBuf;

use serde::Deserialize;

/// Global mirror settings, parsed from the `[settings]` table of the
/// config file and then overlaid with any matching CLI flags.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
	pub mirror_dir: PathBuf,
	pub skel_dir: PathBuf,
	pub var_dir: PathBuf,

	pub architectures: Vec<String>,
	pub languages: Vec<String>,

	pub threads: usize,
	pub contents: bool,
	pub by_hash: bool,
	pub force_update: bool,
	pub test: bool,

	pub limit_rate: Option<String>,

	pub use_proxy: bool,
	pub http_proxy: Option<String>,
	pub https_proxy: Option<String>,
	pub proxy_user: Option<String>,
	pub proxy_password: Option<String>,

	pub certificate: Option<PathBuf>,
	pub ca_certificate: Option<PathBuf>,
	pub private_key: Option<PathBuf>,
	pub no_check_certificate: bool,
	pub auth_no_challenge: bool,
	pub unlink: bool,
}

impl Default for Settings {
	fn default() -> Self {
		Settings {
			mirror_dir: PathBuf::from("./mirror"),
			skel_dir: PathBuf::from("./skel"),
			var_dir: PathBuf::from("./var"),
			architectures: Vec::new(),
			languages: vec!["en".to_string()],
			threads: 4,
			contents: false,
			by_hash: false,
			force_update: false,
			test: false,
			limit_rate: None,
			use_proxy: false,
			http_proxy: None,
			https_proxy: None,
			proxy_user: None,
			proxy_password: None,
			certificate: None,
			ca_certificate: None,
			private_key: None,
			no_check_certificate: false,
			auth_no_challenge: false,
			unlink: false,
		}
	}
}

impl Settings {
	/// Overlay CLI-provided overrides; CLI flags always win since they are
	/// given explicitly at invocation time.
	pub fn apply_cli_overrides(
		&mut self,
		test: bool,
		force: bool,
		threads: Option<usize>,
	) {
		if test {
			self.test = true;
		}
		if force {
			self.force_update = true;
		}
		if let Some(threads) = threads {
			self.threads = threads;
		}
	}
}
