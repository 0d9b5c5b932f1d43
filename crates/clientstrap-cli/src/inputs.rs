use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{ArgAction, Parser};

/// Run inputs. Each one can also be supplied the way GitHub Actions passes
/// action inputs, as an `INPUT_<NAME>` environment variable.
#[derive(Parser, Debug, Clone)]
#[command(name = "clientstrap")]
#[command(about = "Unattended Riot Client and League Client setup for CI runners", long_about = None)]
pub struct Inputs {
    #[arg(long, env = "INPUT_REGION")]
    pub region: String,
    #[arg(long, env = "INPUT_PATCHLINE", default_value = "live")]
    pub patchline: String,
    /// Installer configuration; defaults to the region.
    #[arg(long = "config", env = "INPUT_CONFIG")]
    pub installer_config: Option<String>,
    #[arg(long, env = "INPUT_FULL-INSTALL", default_value = "false", value_parser = parse_action_bool, action = ArgAction::Set)]
    pub full_install: bool,
    #[arg(long, env = "INPUT_INSTALL-PENGU", default_value = "false", value_parser = parse_action_bool, action = ArgAction::Set)]
    pub install_pengu: bool,
    #[arg(long, env = "INPUT_IS-DEBUG", default_value = "false", value_parser = parse_action_bool, action = ArgAction::Set)]
    pub is_debug: bool,
    /// Base64 `RiotClientSettings.yaml`.
    #[arg(long, env = "INPUT_FILE_CLIENT_SETTINGS_CONTENT", default_value = "", hide_env_values = true)]
    pub client_settings: String,
    /// Base64 `RiotGamesPrivateSettings.yaml`.
    #[arg(long, env = "INPUT_FILE_PRIVATE_SETTINGS_CONTENT", default_value = "", hide_env_values = true)]
    pub private_settings: String,
    /// Base64 cookie jar.
    #[arg(long, env = "INPUT_FILE_COOKIES_CONTENT", default_value = "", hide_env_values = true)]
    pub cookies: String,
    /// Optional TOML file overriding URLs, install options and timings.
    #[arg(long, env = "CLIENTSTRAP_SETTINGS")]
    pub settings: Option<PathBuf>,
}

impl Inputs {
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(anyhow!("input 'region' is required"));
        }
        Ok(())
    }

    pub fn region(&self) -> &str {
        self.region.trim()
    }

    pub fn patchline(&self) -> &str {
        match self.patchline.trim() {
            "" => "live",
            patchline => patchline,
        }
    }

    pub fn installer_config(&self) -> &str {
        match self.installer_config.as_deref().map(str::trim) {
            Some(config) if !config.is_empty() => config,
            _ => self.region(),
        }
    }
}

/// Boolean inputs follow the YAML 1.2 core schema Actions uses. An empty value
/// is an unset input.
pub fn parse_action_bool(value: &str) -> Result<bool, String> {
    match value.trim() {
        "true" | "True" | "TRUE" => Ok(true),
        "false" | "False" | "FALSE" | "" => Ok(false),
        other => Err(format!(
            "'{other}' is not a boolean; use true, True, TRUE, false, False or FALSE"
        )),
    }
}
