use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clientstrap_api::{ControlApiClient, FailurePolicy};
use clientstrap_core::{Deadline, Error, Lockfile};
use clientstrap_installer::{
    count_running, download_client, download_file, extract_zip, league_client_exe,
    league_client_lockfile, read_lockfile_settled, read_riot_client_path, remove_file_if_exists,
    run_to_exit, seed_files, spawn_detached, terminate_all, ClientLayout, FileWaiter,
    InstallPoller, PatchStatusExtractor, PollConfig, ProductStateExtractor,
    SeedFile,
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::inputs::Inputs;
use crate::outputs::{ActionOutput, OutputSink};
use crate::render::ProgressReporter;

pub const RIOT_CLIENT_PROCESS: &str = "RiotClientServices";
const LOCKFILE_READ_ATTEMPTS: u32 = 5;
const LOCKFILE_RETRY_DELAY: Duration = Duration::from_millis(500);

pub struct RunContext {
    pub inputs: Inputs,
    pub settings: Settings,
    pub layout: ClientLayout,
    pub downloads: reqwest::Client,
    pub overall: Option<Deadline>,
}

impl RunContext {
    pub fn new(inputs: Inputs, settings: Settings, layout: ClientLayout) -> Result<Self> {
        let overall = settings.timing.overall.map(Deadline::after);
        Ok(Self {
            inputs,
            settings,
            layout,
            downloads: download_client()?,
            overall,
        })
    }

    /// Step budget, capped by the overall deadline.
    fn budget(&self, timeout: Duration) -> Option<Deadline> {
        Deadline::earliest(Some(Deadline::after(timeout)), self.overall)
    }

    fn product(&self) -> &str {
        &self.settings.install.product
    }

    pub fn install_id(&self) -> String {
        format!("{}.{}", self.product(), self.inputs.patchline().to_lowercase())
    }

    async fn settle(&self, delay: Duration, operation: &str) -> Result<()> {
        clientstrap_core::pause(delay, self.overall, operation).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiotClientInstall {
    pub executable: PathBuf,
    pub directory: PathBuf,
}

pub struct RiotClientSession {
    pub client: ControlApiClient,
    pub lockfile_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeagueClientInstall {
    pub directory: PathBuf,
    pub executable: PathBuf,
    pub lockfile_path: PathBuf,
}

impl LeagueClientInstall {
    pub fn from_directory(directory: PathBuf) -> Self {
        Self {
            executable: league_client_exe(&directory),
            lockfile_path: league_client_lockfile(&directory),
            directory,
        }
    }
}

pub fn patch_job_path(product: &str, patchline: &str) -> String {
    format!("/patch-proxy/v1/priority-patch-jobs/products/{product}/patchlines/{patchline}")
}

pub fn install_status_path(install_id: &str) -> String {
    format!("/patch/v1/installs/{install_id}/status")
}

pub fn install_record_path(install_id: &str) -> String {
    format!("/patch/v1/installs/{install_id}")
}

pub fn product_state_path(product: &str) -> String {
    format!("/lol-patch/v1/products/{product}/state")
}

pub const EULA_ACCEPTANCE_PATH: &str = "/eula/v1/agreement/acceptance";

pub fn launch_args(product: &str, patchline: &str, region: &str) -> Vec<String> {
    vec![
        format!("--launch-product={product}"),
        format!("--launch-patchline={patchline}"),
        format!("--region={region}"),
    ]
}

pub async fn run(ctx: &RunContext, sink: &OutputSink) -> Result<()> {
    debug!(
        region = ctx.inputs.region(),
        patchline = ctx.inputs.patchline(),
        config = ctx.inputs.installer_config(),
        full_install = ctx.inputs.full_install,
        install_pengu = ctx.inputs.install_pengu,
        "resolved inputs"
    );

    let riot_client = install_riot_client(ctx).await?;
    close_riot_client(ctx).await?;
    seed_client_settings(ctx).await?;
    let rcs = relaunch_riot_client(ctx).await?;
    let league = install_league_client(ctx, &rcs).await?;

    if ctx.inputs.install_pengu {
        install_pengu(ctx).await?;
    }
    run_lcu_patcher(ctx, &league).await?;
    accept_eula(ctx, &rcs).await?;

    let lcu = attach_league_client(ctx, &league).await?;
    if ctx.inputs.full_install {
        install_league_of_legends(ctx, &lcu).await?;
    }

    info!("Setting output...");
    let rcs_lockfile = Lockfile::read(&rcs.lockfile_path)?;
    let lcu_lockfile = Lockfile::read(&league.lockfile_path)?;
    let outputs = collect_outputs(
        &rcs_lockfile,
        &riot_client,
        &lcu_lockfile,
        &league,
        &ctx.layout.pengu_dir(),
    );
    sink.publish_all(&outputs)
}

pub async fn install_riot_client(ctx: &RunContext) -> Result<RiotClientInstall> {
    info!("Downloading installer...");
    let installer = ctx.layout.installer_path(ctx.inputs.region());
    let url = ctx
        .settings
        .urls
        .installer_url(ctx.inputs.patchline(), ctx.inputs.installer_config());
    download_file(&ctx.downloads, &url, &installer).await?;

    info!("Installing Riot Client...");
    let status = run_to_exit(&installer, ["--skip-to-install"], None).await?;
    if !status.success() {
        warn!(%status, "Riot Client installer exited unsuccessfully");
    }

    debug!("Waiting for RiotClientInstalls.json...");
    let installs = ctx.layout.riot_client_installs_path();
    FileWaiter::new()
        .wait_for(&installs, ctx.budget(ctx.settings.timing.file_wait))
        .await
        .with_context(|| format!("Riot Client install record never appeared: {}", installs.display()))?;

    info!("Locating Riot Client...");
    let executable = read_riot_client_path(&installs)?;
    let directory = executable
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("Riot Client path has no parent: {}", executable.display()))?;
    debug!(path = %executable.display(), directory = %directory.display(), "Riot Client located");

    Ok(RiotClientInstall {
        executable,
        directory,
    })
}

pub async fn close_riot_client(ctx: &RunContext) -> Result<usize> {
    info!("Closing Riot Client...");
    let closed = terminate_all(
        RIOT_CLIENT_PROCESS,
        ctx.budget(ctx.settings.timing.process_exit),
    )
    .await?;
    debug!(closed, "Riot Client processes closed");
    Ok(closed)
}

pub async fn seed_client_settings(ctx: &RunContext) -> Result<usize> {
    info!("Copying settings and cookies...");
    let files = [
        SeedFile {
            path: ctx.layout.client_settings_path(),
            payload: ctx.inputs.client_settings.clone(),
        },
        SeedFile {
            path: ctx.layout.private_settings_path(),
            payload: ctx.inputs.private_settings.clone(),
        },
        SeedFile {
            path: ctx.layout.cookies_path(),
            payload: ctx.inputs.cookies.clone(),
        },
    ];
    let written = seed_files(&files).await?;
    debug!(written, "settings files seeded");
    Ok(written)
}

pub async fn relaunch_riot_client(ctx: &RunContext) -> Result<RiotClientSession> {
    info!("Downloading and running LeagueNoVGK...");
    let launcher = ctx.layout.league_no_vgk_path();
    download_file(&ctx.downloads, &ctx.settings.urls.league_no_vgk, &launcher).await?;

    // The wait below must see the lockfile of the new instance.
    let lockfile_path = ctx.layout.riot_client_lockfile_path();
    remove_file_if_exists(&lockfile_path)
        .with_context(|| format!("failed to remove stale lockfile: {}", lockfile_path.display()))?;

    let pid = spawn_detached(
        &launcher,
        launch_args(ctx.product(), ctx.inputs.patchline(), ctx.inputs.region()),
    )?;
    debug!(pid, "LeagueNoVGK started");

    let client = connect_when_ready(ctx, &lockfile_path).await?;
    Ok(RiotClientSession {
        client,
        lockfile_path,
    })
}

async fn connect_when_ready(ctx: &RunContext, lockfile_path: &Path) -> Result<ControlApiClient> {
    FileWaiter::new()
        .wait_for(lockfile_path, ctx.budget(ctx.settings.timing.file_wait))
        .await
        .with_context(|| format!("lockfile never appeared: {}", lockfile_path.display()))?;
    ctx.settle(ctx.settings.timing.lockfile_settle, "lockfile settle")
        .await?;

    let lockfile =
        read_lockfile_settled(lockfile_path, LOCKFILE_READ_ATTEMPTS, LOCKFILE_RETRY_DELAY).await?;
    debug!(name = %lockfile.name, pid = lockfile.pid, port = lockfile.port, "lockfile read");
    Ok(ControlApiClient::new(&lockfile)?)
}

pub async fn install_league_client(
    ctx: &RunContext,
    rcs: &RiotClientSession,
) -> Result<LeagueClientInstall> {
    info!("Installing League Client...");
    ctx.settle(ctx.settings.timing.patch_job_delay, "patch job delay")
        .await?;

    let install = &ctx.settings.install;
    let job = json!({
        "createShortcut": install.create_shortcut,
        "installPath": install.path,
    });
    rcs.client
        .put(
            &patch_job_path(ctx.product(), ctx.inputs.patchline()),
            Some(&job),
            ctx.overall,
        )
        .await
        .context("failed to queue League Client patch job")?;

    let install_id = ctx.install_id();
    let config = PollConfig {
        interval: ctx.settings.timing.poll_interval,
        deadline: ctx.overall,
        ..PollConfig::default()
    };
    let mut reporter = ProgressReporter::start("League Client");
    let outcome = InstallPoller::new(&rcs.client, install_status_path(&install_id), PatchStatusExtractor)
        .with_config(config)
        .run(|progress| reporter.update(progress))
        .await;
    if let Err(err) = outcome {
        reporter.finish_abandon();
        if matches!(err, Error::ProtocolViolation { .. }) {
            debug!(
                running = count_running(RIOT_CLIENT_PROCESS),
                "Riot Client processes running"
            );
        }
        return Err(err).context("Failed to get Riot Client install status");
    }
    reporter.finish_success();
    info!("Successfully installed!");

    let record = rcs
        .client
        .get_json(
            &install_record_path(&install_id),
            FailurePolicy::Propagate,
            ctx.overall,
        )
        .await?
        .ok_or_else(|| anyhow!("install record for {install_id} is empty"))?;
    let league = LeagueClientInstall::from_directory(install_record_directory(&record)?);
    debug!(
        directory = %league.directory.display(),
        executable = %league.executable.display(),
        "League Client located"
    );
    Ok(league)
}

pub fn install_record_directory(record: &Value) -> Result<PathBuf> {
    record
        .get("path")
        .and_then(Value::as_str)
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("install record has no path: {record}"))
}

pub async fn install_pengu(ctx: &RunContext) -> Result<PathBuf> {
    info!("Downloading and activating Pengu Loader...");
    let archive = ctx.layout.pengu_archive_path();
    let dir = ctx.layout.pengu_dir();
    download_file(&ctx.downloads, &ctx.settings.urls.pengu_loader, &archive).await?;
    extract_zip(&archive, &dir).await?;

    let status = run_to_exit(&ctx.layout.pengu_exe(), ["--install"], Some(&dir)).await?;
    if !status.success() {
        bail!("Pengu Loader activation failed with {status}");
    }
    Ok(dir)
}

pub async fn run_lcu_patcher(ctx: &RunContext, league: &LeagueClientInstall) -> Result<()> {
    info!("Downloading and running lcu-patcher...");
    let patcher = ctx.layout.lcu_patcher_exe();
    if !patcher.exists() {
        let archive = ctx.layout.lcu_patcher_archive_path();
        download_file(&ctx.downloads, &ctx.settings.urls.lcu_patcher, &archive).await?;
        extract_zip(&archive, &ctx.layout.lcu_patcher_dir()).await?;
    } else {
        debug!(path = %patcher.display(), "lcu-patcher already present");
    }

    let status = run_to_exit(&patcher, [league.executable.as_os_str()], None).await?;
    if !status.success() {
        bail!("lcu-patcher failed with {status}");
    }
    Ok(())
}

pub async fn accept_eula(ctx: &RunContext, rcs: &RiotClientSession) -> Result<()> {
    info!("Accepting EULA...");
    rcs.client
        .put(EULA_ACCEPTANCE_PATH, None, ctx.overall)
        .await
        .context("failed to accept EULA")?;
    ctx.settle(ctx.settings.timing.eula_delay, "EULA settle").await
}

pub async fn attach_league_client(
    ctx: &RunContext,
    league: &LeagueClientInstall,
) -> Result<ControlApiClient> {
    let client = connect_when_ready(ctx, &league.lockfile_path).await?;
    warm_up_league_client(ctx, &client).await?;
    Ok(client)
}

/// The League Client answers its first request before its plugins are up;
/// that request is sent and its outcome discarded.
pub async fn warm_up_league_client(ctx: &RunContext, lcu: &ControlApiClient) -> Result<()> {
    let warmup = ctx.settings.timing.league_client_warmup;
    ctx.settle(warmup, "League Client warmup").await?;

    debug!("Burning first request...");
    if let Err(err) = lcu.get(&product_state_path(ctx.product()), ctx.overall).await {
        if err.is_timeout() && ctx.overall.is_some_and(Deadline::is_expired) {
            return Err(err.into());
        }
        debug!(error = %err, "first League Client request failed");
    }

    ctx.settle(warmup, "League Client warmup").await
}

pub async fn install_league_of_legends(ctx: &RunContext, lcu: &ControlApiClient) -> Result<()> {
    info!("Installing League of Legends...");
    let config = PollConfig {
        interval: ctx.settings.timing.poll_interval,
        deadline: ctx.overall,
        ..PollConfig::default()
    };
    let mut reporter = ProgressReporter::start("LCU");
    let outcome = InstallPoller::new(lcu, product_state_path(ctx.product()), ProductStateExtractor)
        .with_config(config)
        .run(|progress| reporter.update(progress))
        .await;
    match outcome {
        Ok(outcome) => {
            reporter.finish_success();
            debug!(polls = outcome.polls, "League of Legends is idle");
            Ok(())
        }
        Err(err) => {
            reporter.finish_abandon();
            Err(err).context("Failed to get LCU state")
        }
    }
}

pub fn collect_outputs(
    rcs_lockfile: &Lockfile,
    riot_client: &RiotClientInstall,
    lcu_lockfile: &Lockfile,
    league: &LeagueClientInstall,
    pengu_dir: &Path,
) -> Vec<ActionOutput> {
    vec![
        ActionOutput::secret("rcs-password", rcs_lockfile.password.clone()),
        ActionOutput::plain("rcs-port", rcs_lockfile.port.to_string()),
        ActionOutput::plain("rcs-directory", riot_client.executable.display().to_string()),
        ActionOutput::secret("lcu-password", lcu_lockfile.password.clone()),
        ActionOutput::plain("lcu-port", lcu_lockfile.port.to_string()),
        ActionOutput::plain("lcu-directory", league.directory.display().to_string()),
        ActionOutput::plain("pengu-directory", pengu_dir.display().to_string()),
    ]
}
