use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

use super::transport::Transport;
use crate::lock::DownloadMarker;

const MAX_PER_DOMAIN: u8 = 3;
const MAX_RETRIES: u8 = 3;

#[derive(Debug, Clone)]
pub struct DownloadJob {
	pub url: String,
	pub dest: PathBuf,
}

#[derive(Debug)]
pub enum Message {
	Progress,
	NonFatal(String),
}

#[derive(Debug)]
pub struct DownloadOutcome {
	pub url: String,
	pub ok: bool,
}

/// Bounded-concurrency download pool: a fixed set of workers pulled from a
/// `JoinSet`, capped per-domain so one slow mirror can't starve the others,
/// each reporting progress back over an unbounded channel while the caller
/// renders it. Crash markers bracket every individual file write so a
/// killed process leaves behind exactly the evidence needed to discard the
/// partial file on the next run.
pub struct DownloaderPool<T: Transport + Clone + Send + Sync + 'static> {
	transport: T,
	concurrency: usize,
	var_dir: PathBuf,
	show_progress: bool,
}

impl<T: Transport + Clone + Send + Sync + 'static> DownloaderPool<T> {
	pub fn new(transport: T, concurrency: usize, var_dir: PathBuf) -> Self {
		DownloaderPool { transport, concurrency: concurrency.max(1), var_dir, show_progress: true }
	}

	pub fn with_progress(mut self, show_progress: bool) -> Self {
		self.show_progress = show_progress;
		self
	}

	pub async fn run(&self, jobs: Vec<DownloadJob>) -> Result<Vec<DownloadOutcome>> {
		let total = jobs.len();
		let bar = (self.show_progress && total > 0).then(|| {
			let bar = indicatif::ProgressBar::new(total as u64);
			bar.set_style(
				indicatif::ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
					.unwrap_or_else(|_| indicatif::ProgressStyle::default_bar()),
			);
			bar
		});

		let domains: Arc<Mutex<HashMap<String, u8>>> = Arc::new(Mutex::new(HashMap::new()));
		let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
		let mut set = JoinSet::new();
		let mut pending = jobs.into_iter();
		let mut outcomes = Vec::new();

		for _ in 0..self.concurrency {
			if let Some(job) = pending.next() {
				self.spawn(&mut set, job, domains.clone(), tx.clone());
			}
		}

		while let Some(result) = set.join_next().await {
			while let Ok(message) = rx.try_recv() {
				if let (Some(bar), Message::NonFatal(reason)) = (&bar, &message) {
					bar.set_message(reason.clone());
				}
			}

			let outcome = result??;
			outcomes.push(outcome);
			if let Some(bar) = &bar {
				bar.inc(1);
			}
			if let Some(job) = pending.next() {
				self.spawn(&mut set, job, domains.clone(), tx.clone());
			}
		}
		drop(tx);

		if let Some(bar) = bar {
			bar.finish_and_clear();
		}
		Ok(outcomes)
	}

	fn spawn(
		&self,
		set: &mut JoinSet<Result<DownloadOutcome>>,
		job: DownloadJob,
		domains: Arc<Mutex<HashMap<String, u8>>>,
		tx: mpsc::UnboundedSender<Message>,
	) {
		let transport = self.transport.clone();
		let var_dir = self.var_dir.clone();
		set.spawn(async move { download_one(transport, job, domains, var_dir, tx).await });
	}
}

async fn download_one<T: Transport>(
	transport: T,
	job: DownloadJob,
	domains: Arc<Mutex<HashMap<String, u8>>>,
	var_dir: PathBuf,
	tx: mpsc::UnboundedSender<Message>,
) -> Result<DownloadOutcome> {
	let domain = extract_domain(&job.url);
	wait_for_domain_slot(&domains, &domain).await;

	let marker_id = sanitize_marker_id(&job.url);
	let marker = DownloadMarker::create(&var_dir, &marker_id, &job.dest).await?;

	let mut attempt = 0;
	let result = loop {
		attempt += 1;
		match transport.fetch(&job.url, &job.dest).await {
			Ok(last_modified) => {
				if let Some(mtime) = last_modified {
					let _ = filetime::set_file_mtime(&job.dest, filetime::FileTime::from_system_time(mtime));
				}
				let _ = tx.send(Message::Progress);
				break Ok(());
			},
			Err(err) if attempt < MAX_RETRIES => {
				let _ = tx.send(Message::NonFatal(format!("{} (attempt {attempt}): {err}", job.url)));
				tokio::time::sleep(std::time::Duration::from_millis(250 * attempt as u64)).await;
				continue;
			},
			Err(err) => break Err(err),
		}
	};

	release_domain_slot(&domains, &domain).await;
	marker.clear().await?;

	Ok(DownloadOutcome { url: job.url, ok: result.is_ok() })
}

async fn wait_for_domain_slot(domains: &Arc<Mutex<HashMap<String, u8>>>, domain: &str) {
	loop {
		let mut map = domains.lock().await;
		let count = map.entry(domain.to_string()).or_insert(0);
		if *count < MAX_PER_DOMAIN {
			*count += 1;
			return;
		}
		drop(map);
		tokio::time::sleep(std::time::Duration::from_millis(25)).await;
	}
}

async fn release_domain_slot(domains: &Arc<Mutex<HashMap<String, u8>>>, domain: &str) {
	if let Some(count) = domains.lock().await.get_mut(domain) {
		*count = count.saturating_sub(1);
	}
}

fn extract_domain(url: &str) -> String {
	url.split("://").nth(1).and_then(|rest| rest.split('/').next()).unwrap_or(url).to_string()
}

fn sanitize_marker_id(url: &str) -> String {
	url.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect()
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap as StdHashMap;

	use tempfile::tempdir;

	use super::super::transport::FakeTransport;
	use super::*;

	#[tokio::test]
	async fn downloads_every_job_and_reports_outcomes() {
		let dir = tempdir().unwrap();
		let mut pages = StdHashMap::new();
		pages.insert("http://a/Packages".to_string(), b"package a".to_vec());
		pages.insert("http://b/Packages".to_string(), b"package b".to_vec());

		let pool = DownloaderPool::new(FakeTransport { pages }, 2, dir.path().to_path_buf());
		let jobs = vec![
			DownloadJob { url: "http://a/Packages".into(), dest: dir.path().join("a/Packages") },
			DownloadJob { url: "http://b/Packages".into(), dest: dir.path().join("b/Packages") },
		];

		let outcomes = pool.run(jobs).await.unwrap();
		assert_eq!(outcomes.len(), 2);
		assert!(outcomes.iter().all(|o| o.ok));
		assert!(dir.path().join("a/Packages").exists());
	}

	#[tokio::test]
	async fn missing_page_is_reported_as_a_failed_outcome() {
		let dir = tempdir().unwrap();
		let pool = DownloaderPool::new(FakeTransport { pages: StdHashMap::new() }, 1, dir.path().to_path_buf());
		let jobs = vec![DownloadJob { url: "http://a/Packages".into(), dest: dir.path().join("a/Packages") }];

		let outcomes = pool.run(jobs).await.unwrap();
		assert_eq!(outcomes.len(), 1);
		assert!(!outcomes[0].ok);
	}

	#[test]
	fn extracts_domain_from_url() {
		assert_eq!(extract_domain("http://deb.example.com/path"), "deb.example.com");
	}
}
