use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Where the client installer, its state files and the helper tools live on a runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientLayout {
    temp_dir: PathBuf,
    local_app_data: PathBuf,
    program_data: PathBuf,
}

impl ClientLayout {
    pub fn new(
        temp_dir: impl Into<PathBuf>,
        local_app_data: impl Into<PathBuf>,
        program_data: impl Into<PathBuf>,
    ) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            local_app_data: local_app_data.into(),
            program_data: program_data.into(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let temp_dir = std::env::var_os("RUNNER_TEMP")
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);
        let local_app_data = std::env::var_os("LOCALAPPDATA")
            .map(PathBuf::from)
            .context("LOCALAPPDATA is not set; cannot locate Riot Client config")?;
        let program_data = std::env::var_os("PROGRAMDATA")
            .map(PathBuf::from)
            .context("PROGRAMDATA is not set; cannot locate RiotClientInstalls.json")?;
        Ok(Self::new(temp_dir, local_app_data, program_data))
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn installer_path(&self, region: &str) -> PathBuf {
        self.temp_dir.join(format!("install.{region}.exe"))
    }

    pub fn riot_client_installs_path(&self) -> PathBuf {
        self.program_data
            .join("Riot Games")
            .join("RiotClientInstalls.json")
    }

    pub fn riot_client_data_dir(&self) -> PathBuf {
        self.local_app_data.join("Riot Games").join("Riot Client")
    }

    pub fn riot_client_config_dir(&self) -> PathBuf {
        self.riot_client_data_dir().join("Config")
    }

    pub fn riot_client_lockfile_path(&self) -> PathBuf {
        self.riot_client_config_dir().join("lockfile")
    }

    pub fn client_settings_path(&self) -> PathBuf {
        self.riot_client_config_dir().join("RiotClientSettings.yaml")
    }

    pub fn private_settings_path(&self) -> PathBuf {
        self.riot_client_data_dir()
            .join("Data")
            .join("RiotGamesPrivateSettings.yaml")
    }

    pub fn cookies_path(&self) -> PathBuf {
        self.riot_client_config_dir().join("Cookies").join("Cookie")
    }

    pub fn league_no_vgk_path(&self) -> PathBuf {
        self.temp_dir.join("league-no-vgk.exe")
    }

    pub fn pengu_archive_path(&self) -> PathBuf {
        self.temp_dir.join("pengu-loader.zip")
    }

    pub fn pengu_dir(&self) -> PathBuf {
        self.temp_dir.join("pengu-loader")
    }

    pub fn pengu_exe(&self) -> PathBuf {
        self.pengu_dir().join("Pengu Loader.exe")
    }

    pub fn lcu_patcher_archive_path(&self) -> PathBuf {
        self.temp_dir.join("lcu-patcher.zip")
    }

    pub fn lcu_patcher_dir(&self) -> PathBuf {
        self.temp_dir.join("lcu-patcher")
    }

    pub fn lcu_patcher_exe(&self) -> PathBuf {
        self.lcu_patcher_dir().join("lcu-patcher.exe")
    }
}

pub fn league_client_exe(install_dir: &Path) -> PathBuf {
    install_dir.join("LeagueClient.exe")
}

pub fn league_client_lockfile(install_dir: &Path) -> PathBuf {
    install_dir.join("lockfile")
}
