use std::process::ExitCode;

use anyhow::Result;
use aptmirror::cli::{Cli, Command};
use aptmirror::config::loader::{self, LoadOutcome};
use aptmirror::config::logger::LogOptions;
use aptmirror::config::{self, Level};
use aptmirror::context::RunContext;
use aptmirror::download::ReqwestTransport;
use aptmirror::orchestrator::Orchestrator;
use aptmirror::{error, info, lock, warn};
use clap::Parser;

fn main() -> ExitCode {
	let cli = Cli::parse();

	let level = if cli.debug {
		Level::Debug
	} else if cli.verbose {
		Level::Verbose
	} else {
		Level::Info
	};
	let logger = config::setup_logger(LogOptions::new(level, Box::new(std::io::stderr())));
	logger.lock().unwrap().set_level(level);

	let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
		Ok(runtime) => runtime,
		Err(err) => {
			eprintln!("Error: failed to start async runtime: {err}");
			return ExitCode::FAILURE;
		},
	};

	match runtime.block_on(run(cli)) {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			error!("{err:?}");
			ExitCode::FAILURE
		},
	}
}

async fn run(cli: Cli) -> Result<()> {
	let outcome = loader::load(&cli.config).await?;
	let (mut settings, repositories) = match outcome {
		LoadOutcome::CreatedDefault => {
			info!("No config found, wrote a starter config to {:?}. Edit it and re-run.", cli.config);
			return Ok(());
		},
		LoadOutcome::Loaded { settings, repositories } => (settings, repositories),
	};
	settings.apply_cli_overrides(cli.test, cli.force, cli.threads);

	tokio::fs::create_dir_all(&settings.mirror_dir).await?;
	tokio::fs::create_dir_all(&settings.skel_dir).await?;
	tokio::fs::create_dir_all(&settings.var_dir).await?;

	let stale_markers = lock::scan_stale_markers(&settings.var_dir).await?;
	for marker in &stale_markers {
		warn!("Discarding partial download left over from a previous run: {:?}", marker.dest);
		marker.discard().await?;
	}

	let (app_lock, previous_run_interrupted) = lock::AppLock::acquire(&settings.var_dir).await?;
	let previous_run_interrupted = previous_run_interrupted || !stale_markers.is_empty();
	if previous_run_interrupted {
		warn!("Previous run was interrupted; forcing a full re-scan of all repositories.");
	}

	let client = build_client(&settings)?;
	let transport = ReqwestTransport::new(client);
	let ctx = RunContext::new(settings, previous_run_interrupted);
	let mut orchestrator = Orchestrator::new(ctx, repositories, transport, !cli.no_progress);

	let result = match cli.effective_command() {
		Command::Mirror => orchestrator.mirror().await,
		Command::Clean => orchestrator.clean().await,
	};

	app_lock.release().await?;
	result
}

fn build_client(settings: &config::Settings) -> Result<reqwest::Client> {
	let mut builder = reqwest::Client::builder().danger_accept_invalid_certs(settings.no_check_certificate);

	if settings.use_proxy {
		if let Some(proxy) = &settings.http_proxy {
			builder = builder.proxy(with_proxy_auth(reqwest::Proxy::http(proxy)?, settings));
		}
		if let Some(proxy) = &settings.https_proxy {
			builder = builder.proxy(with_proxy_auth(reqwest::Proxy::https(proxy)?, settings));
		}
	}

	Ok(builder.build()?)
}

fn with_proxy_auth(proxy: reqwest::Proxy, settings: &config::Settings) -> reqwest::Proxy {
	match (&settings.proxy_user, &settings.proxy_password) {
		(Some(user), Some(pass)) => proxy.basic_auth(user, pass),
		_ => proxy,
	}
}
