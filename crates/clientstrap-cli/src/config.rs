use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub urls: UrlSettings,
    pub install: InstallSettings,
    pub timing: TimingSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct UrlSettings {
    pub installer_base: String,
    pub league_no_vgk: String,
    pub pengu_loader: String,
    pub lcu_patcher: String,
}

impl Default for UrlSettings {
    fn default() -> Self {
        Self {
            installer_base: "https://lol.secure.dyn.riotcdn.net/channels/public/x/installer/current"
                .to_string(),
            league_no_vgk:
                "https://github.com/User344/LeagueNoVGK/releases/download/1.0.1/league-no-vgk.exe"
                    .to_string(),
            pengu_loader: "https://github.com/PenguLoader/PenguLoader/releases/download/v1.1.0/pengu-loader-v1.1.0.zip"
                .to_string(),
            lcu_patcher: "https://github.com/lol-tracker/lcu-patcher/releases/download/v1.1.0/lcu-patcher-win64.zip"
                .to_string(),
        }
    }
}

impl UrlSettings {
    pub fn installer_url(&self, patchline: &str, config: &str) -> String {
        format!(
            "{}/{}.{}.exe",
            self.installer_base.trim_end_matches('/'),
            patchline.to_lowercase(),
            config.to_lowercase()
        )
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct InstallSettings {
    pub path: String,
    pub create_shortcut: bool,
    pub product: String,
}

impl Default for InstallSettings {
    fn default() -> Self {
        Self {
            path: "C:\\Riot Games".to_string(),
            create_shortcut: false,
            product: "league_of_legends".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TimingSettings {
    #[serde(deserialize_with = "human_duration")]
    pub poll_interval: Duration,
    #[serde(deserialize_with = "human_duration")]
    pub file_wait: Duration,
    #[serde(deserialize_with = "human_duration")]
    pub process_exit: Duration,
    #[serde(deserialize_with = "human_duration")]
    pub lockfile_settle: Duration,
    #[serde(deserialize_with = "human_duration")]
    pub patch_job_delay: Duration,
    #[serde(deserialize_with = "human_duration")]
    pub eula_delay: Duration,
    #[serde(deserialize_with = "human_duration")]
    pub league_client_warmup: Duration,
    /// Bound on the whole run; unbounded when unset.
    #[serde(deserialize_with = "optional_human_duration")]
    pub overall: Option<Duration>,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
            file_wait: Duration::from_secs(60),
            process_exit: Duration::from_secs(30),
            lockfile_settle: Duration::from_secs(1),
            patch_job_delay: Duration::from_secs(5),
            eula_delay: Duration::from_secs(5),
            league_client_warmup: Duration::from_secs(10),
            overall: None,
        }
    }
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid settings file: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|err| anyhow!("{err}"))
    }
}

fn human_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}

fn optional_human_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    human_duration(deserializer).map(Some)
}
