use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::future::join_all;

/// A file to pre-seed before the client's first launch, as a base64 payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedFile {
    pub path: PathBuf,
    pub payload: String,
}

/// Decodes `payload` and writes it to `path`. An empty payload writes nothing and
/// returns `false`.
pub async fn write_base64_file(path: &Path, payload: &str) -> Result<bool> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Ok(false);
    }

    let decoded = STANDARD
        .decode(payload)
        .with_context(|| format!("invalid base64 payload for {}", path.display()))?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    tokio::fs::write(path, decoded)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}

/// Writes all seed files concurrently and reports how many were written.
pub async fn seed_files(files: &[SeedFile]) -> Result<usize> {
    let writes = files
        .iter()
        .map(|file| write_base64_file(&file.path, &file.payload));
    let written = join_all(writes)
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;
    Ok(written.into_iter().filter(|wrote| *wrote).count())
}
