use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tokio::process::Command;
use tracing::debug;

/// Extracts a zip with whatever the host has: `Expand-Archive` on Windows,
/// then `unzip`, then `tar` (bsdtar reads zip).
pub async fn extract_zip(archive_path: &Path, dst: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dst)
        .await
        .with_context(|| format!("failed to create {}", dst.display()))?;

    if cfg!(windows) {
        let mut command = Command::new("powershell");
        command.arg("-NoProfile").arg("-Command").arg(format!(
            "Expand-Archive -LiteralPath '{}' -DestinationPath '{}' -Force",
            escape_ps_single_quote(archive_path),
            escape_ps_single_quote(dst)
        ));
        match run_command(&mut command, "failed to extract zip archive with powershell").await {
            Ok(()) => return Ok(()),
            Err(err) => debug!("{err:#}"),
        }
    }

    let mut unzip_command = Command::new("unzip");
    unzip_command
        .arg("-q")
        .arg("-o")
        .arg(archive_path)
        .arg("-d")
        .arg(dst);
    match run_command(&mut unzip_command, "failed to extract zip archive with unzip").await {
        Ok(()) => return Ok(()),
        Err(err) => debug!("{err:#}"),
    }

    run_command(
        Command::new("tar")
            .arg("-xf")
            .arg(archive_path)
            .arg("-C")
            .arg(dst),
        "failed to extract zip archive with tar",
    )
    .await
}

pub(crate) async fn run_command(command: &mut Command, context_message: &str) -> Result<()> {
    let output = command
        .output()
        .await
        .with_context(|| format!("{context_message}: command failed to start"))?;
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    Err(anyhow!(
        "{context_message}: status={} stdout='{}' stderr='{}'",
        output.status,
        stdout.trim(),
        stderr.trim()
    ))
}

pub(crate) fn escape_ps_single_quote(path: &Path) -> String {
    path.as_os_str().to_string_lossy().replace('\'', "''")
}
