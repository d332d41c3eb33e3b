use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Reconciling local mirror of Debian-layout package archives.
#[derive(Debug, Parser)]
#[command(name = "aptmirror", version, about)]
pub struct Cli {
	#[command(subcommand)]
	pub command: Option<Command>,

	/// Path to the mirror configuration file.
	#[arg(long, global = true, default_value = "aptmirror.conf")]
	pub config: PathBuf,

	/// Run without writing anything to disk.
	#[arg(long, global = true)]
	pub test: bool,

	/// Disable the progress bar.
	#[arg(long, global = true)]
	pub no_progress: bool,

	/// Ignore cached timestamps and re-download everything.
	#[arg(long, global = true)]
	pub force: bool,

	/// Emit debug-level log output.
	#[arg(long, global = true)]
	pub debug: bool,

	/// Emit verbose-level log output.
	#[arg(long, global = true)]
	pub verbose: bool,

	/// Override the worker thread count from the config file.
	#[arg(long, global = true)]
	pub threads: Option<usize>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
	/// Download and reconcile the configured repositories (default).
	Mirror,
	/// Remove archive files no longer referenced by any configured repository.
	Clean,
}

impl Cli {
	pub fn effective_command(&self) -> Command { self.command.clone().unwrap_or(Command::Mirror) }
}

#[cfg(test)]
mod tests {
	use clap::CommandFactory;

	use super::Cli;

	#[test]
	fn cli_definition_is_valid() { <Cli as CommandFactory>::command().debug_assert(); }

	#[test]
	fn defaults_to_mirror_command() {
		let cli = Cli { command: None, ..minimal() };
		assert!(matches!(cli.effective_command(), super::Command::Mirror));
	}

	fn minimal() -> Cli {
		Cli {
			command: None,
			config: "aptmirror.conf".into(),
			test: false,
			no_progress: false,
			force: false,
			debug: false,
			verbose: false,
			threads: None,
		}
	}
}
