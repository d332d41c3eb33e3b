use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_compression::tokio::bufread::{BzDecoder, GzipDecoder, XzDecoder};
use tokio::fs::File;
use tokio::io::{AsyncRead, BufReader};

use crate::fs_ext::AsyncFs;

/// Compression formats this tool knows how to unwrap, tried in the order
/// archives most commonly ship them in.
const CANDIDATES: [&str; 3] = ["xz", "gz", "bz2"];

/// Decompress whichever compressed sibling of `dest` exists (`dest.xz`,
/// `dest.gz`, or `dest.bz2`, tried in that order) into `dest` itself.
///
/// Returns `Ok(None)` when none of the compressed siblings exist -- callers
/// decide whether that is fatal or just means the section was absent from
/// this repository's Release file. Never logs; the caller has the context
/// needed to report it meaningfully (which index file, which repository).
pub async fn unzip(dest: &Path) -> Result<Option<PathBuf>> {
	for ext in CANDIDATES {
		let compressed = append_extension(dest, ext);
		if !crate::fs_ext::exists(&compressed).await {
			continue;
		}

		let reader = BufReader::new(
			File::open(&compressed)
				.await
				.with_context(|| format!("Failed to open {compressed:?}"))?,
		);
		let mut decoder: Box<dyn AsyncRead + Unpin + Send> = match ext {
			"xz" => Box::new(XzDecoder::new(reader)),
			"gz" => Box::new(GzipDecoder::new(reader)),
			"bz2" => Box::new(BzDecoder::new(reader)),
			_ => unreachable!(),
		};

		let mut out = dest.open_writer().await?;
		tokio::io::copy(&mut decoder, &mut out)
			.await
			.with_context(|| format!("Failed to decompress {compressed:?} into {dest:?}"))?;
		use tokio::io::AsyncWriteExt;
		out.flush().await?;

		return Ok(Some(compressed));
	}

	Ok(None)
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
	let mut s = path.as_os_str().to_owned();
	s.push(".");
	s.push(ext);
	PathBuf::from(s)
}
