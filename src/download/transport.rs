use std::path::Path;
use std::time::SystemTime;

use anyhow::{anyhow, Context, Result};

/// Abstracts the actual network fetch so the pool (and the orchestrator
/// above it) can be driven in tests without a real HTTP server. Generic
/// like `AsyncFs` rather than a trait object, so no extra dependency is
/// needed just to make an async trait usable.
pub trait Transport: Send + Sync {
	/// Stream `url` into `dest`, returning the remote's last-modified time
	/// when the server reports one (used to mimic `wget -N` timestamping).
	fn fetch(&self, url: &str, dest: &Path) -> impl std::future::Future<Output = Result<Option<SystemTime>>> + Send;
}

#[derive(Clone)]
pub struct ReqwestTransport {
	client: reqwest::Client,
}

impl ReqwestTransport {
	pub fn new(client: reqwest::Client) -> Self { ReqwestTransport { client } }
}

impl Transport for ReqwestTransport {
	async fn fetch(&self, url: &str, dest: &Path) -> Result<Option<SystemTime>> {
		use futures::StreamExt;
		use tokio::io::AsyncWriteExt;

		let response = self
			.client
			.get(url)
			.send()
			.await
			.with_context(|| format!("Failed to request {url}"))?
			.error_for_status()
			.with_context(|| format!("Server returned an error status for {url}"))?;

		let last_modified = response
			.headers()
			.get(reqwest::header::LAST_MODIFIED)
			.and_then(|v| v.to_str().ok())
			.and_then(|v| httpdate::parse_http_date(v).ok());

		if let Some(parent) = dest.parent() {
			tokio::fs::create_dir_all(parent)
				.await
				.with_context(|| format!("Failed to create {parent:?}"))?;
		}

		let mut file = tokio::fs::File::create(dest)
			.await
			.with_context(|| format!("Failed to create {dest:?}"))?;

		let mut stream = response.bytes_stream();
		while let Some(chunk) = stream.next().await {
			let chunk = chunk.map_err(|err| anyhow!("Stream error downloading {url}: {err}"))?;
			file.write_all(&chunk).await.with_context(|| format!("Failed to write {dest:?}"))?;
		}
		file.flush().await?;

		Ok(last_modified)
	}
}

/// An in-memory transport for driving the pool and orchestrator without a
/// real network, keyed by exact URL.
#[derive(Clone)]
pub struct FakeTransport {
	pub pages: std::collections::HashMap<String, Vec<u8>>,
}

impl Transport for FakeTransport {
	async fn fetch(&self, url: &str, dest: &Path) -> Result<Option<SystemTime>> {
		let body = self.pages.get(url).ok_or_else(|| anyhow!("404: {url}"))?;
		if let Some(parent) = dest.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}
		tokio::fs::write(dest, body).await?;
		Ok(None)
	}
}
