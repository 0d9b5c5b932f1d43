use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde_json::Value;

/// Reads the Riot Client executable path from `RiotClientInstalls.json`.
pub fn read_riot_client_path(installs_path: &Path) -> Result<PathBuf> {
    let raw = fs::read_to_string(installs_path)
        .with_context(|| format!("failed to read {}", installs_path.display()))?;
    let installs: Value = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", installs_path.display()))?;

    installs
        .get("rc_default")
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("{} has no rc_default entry", installs_path.display()))
}
