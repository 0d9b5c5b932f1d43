use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutput {
    pub name: &'static str,
    pub value: String,
    pub secret: bool,
}

impl ActionOutput {
    pub fn plain(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
            secret: false,
        }
    }

    pub fn secret(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
            secret: true,
        }
    }
}

/// Publishes step outputs: appended to `$GITHUB_OUTPUT` when running under
/// Actions, printed to stdout otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSink {
    file: Option<PathBuf>,
}

impl OutputSink {
    pub fn from_env() -> Self {
        match std::env::var_os("GITHUB_OUTPUT").filter(|value| !value.is_empty()) {
            Some(path) => Self::to_file(path),
            None => Self { file: None },
        }
    }

    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(path.into()),
        }
    }

    pub fn publish(&self, output: &ActionOutput) -> Result<()> {
        let line = render_output_line(output.name, &output.value)?;
        if output.secret {
            println!("::add-mask::{}", output.value);
        }

        let Some(path) = &self.file else {
            println!("{line}");
            return Ok(());
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open output file: {}", path.display()))?;
        writeln!(file, "{line}")
            .with_context(|| format!("failed to write output file: {}", path.display()))
    }

    pub fn publish_all(&self, outputs: &[ActionOutput]) -> Result<()> {
        for output in outputs {
            self.publish(output)?;
        }
        Ok(())
    }
}

pub fn render_output_line(name: &str, value: &str) -> Result<String> {
    if value.contains('\n') || value.contains('\r') {
        return Err(anyhow!("output '{name}' must be a single line"));
    }
    Ok(format!("{name}={value}"))
}
