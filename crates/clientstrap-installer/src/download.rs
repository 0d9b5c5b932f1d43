use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// HTTP client for public downloads. Certificates are verified normally here.
pub fn download_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("clientstrap/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build download client")
}

/// Streams `url` into `destination` through a `.part` file, so an interrupted
/// download never leaves a truncated file under the final name.
pub async fn download_file(client: &reqwest::Client, url: &str, destination: &Path) -> Result<u64> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create download dir: {}", parent.display()))?;
    }

    let part_path = part_path(destination);
    let written = match fetch_into(client, url, &part_path).await {
        Ok(written) => written,
        Err(err) => {
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(err);
        }
    };

    if destination.exists() {
        tokio::fs::remove_file(destination)
            .await
            .with_context(|| format!("failed to replace {}", destination.display()))?;
    }
    tokio::fs::rename(&part_path, destination)
        .await
        .with_context(|| format!("failed to move download into {}", destination.display()))?;

    debug!(url, bytes = written, path = %destination.display(), "downloaded");
    Ok(written)
}

async fn fetch_into(client: &reqwest::Client, url: &str, path: &Path) -> Result<u64> {
    let mut response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("download request failed: {url}"))?
        .error_for_status()
        .with_context(|| format!("download refused: {url}"))?;

    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut written = 0_u64;
    while let Some(chunk) = response
        .chunk()
        .await
        .with_context(|| format!("download interrupted: {url}"))?
    {
        file.write_all(&chunk)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(written)
}

fn part_path(destination: &Path) -> PathBuf {
    destination.with_file_name(format!(
        "{}.part",
        destination
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("download")
    ))
}
