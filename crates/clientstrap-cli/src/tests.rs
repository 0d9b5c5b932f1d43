use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use clap::Parser;
use clientstrap_api::{ControlApiClient, Endpoint};
use clientstrap_core::{ByteProgress, InstallProgress, Lockfile};
use clientstrap_installer::ClientLayout;
use serde_json::{json, Value};

use crate::config::Settings;
use crate::inputs::{parse_action_bool, Inputs};
use crate::logging::default_directive;
use crate::outputs::{render_output_line, ActionOutput, OutputSink};
use crate::render::{
    describe_progress, format_elapsed, render_progress_line, resolve_output_style, OutputStyle,
};
use crate::workflow::*;

fn test_dir(label: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "clientstrap-cli-{label}-{}-{nanos}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).expect("must create test dir");
    dir
}

fn parse_inputs(args: &[&str]) -> Inputs {
    let mut argv = vec!["clientstrap"];
    argv.extend_from_slice(args);
    Inputs::try_parse_from(argv).expect("inputs must parse")
}

fn fast_settings() -> Settings {
    let mut settings = Settings::default();
    settings.timing.poll_interval = Duration::from_millis(10);
    settings.timing.file_wait = Duration::from_secs(2);
    settings.timing.lockfile_settle = Duration::from_millis(1);
    settings.timing.patch_job_delay = Duration::from_millis(1);
    settings.timing.eula_delay = Duration::from_millis(1);
    settings.timing.league_client_warmup = Duration::from_millis(1);
    settings
}

fn test_context(label: &str, args: &[&str]) -> RunContext {
    let root = test_dir(label);
    let layout = ClientLayout::new(
        root.join("temp"),
        root.join("local"),
        root.join("program-data"),
    );
    RunContext::new(parse_inputs(args), fast_settings(), layout).expect("must build context")
}

#[test]
fn action_bools_accept_yaml_core_spellings() {
    for value in ["true", "True", "TRUE"] {
        assert_eq!(parse_action_bool(value), Ok(true), "{value}");
    }
    for value in ["false", "False", "FALSE", ""] {
        assert_eq!(parse_action_bool(value), Ok(false), "{value}");
    }
    let err = parse_action_bool("yes").expect_err("yes is not an action bool");
    assert!(err.contains("'yes'"), "{err}");
}

#[test]
fn inputs_default_patchline_and_config() {
    let inputs = parse_inputs(&["--region", "EUW1"]);
    assert_eq!(inputs.region(), "EUW1");
    assert_eq!(inputs.patchline(), "live");
    assert_eq!(inputs.installer_config(), "EUW1");
    assert!(!inputs.full_install);
    assert!(!inputs.install_pengu);
    assert!(inputs.validate().is_ok());
}

#[test]
fn blank_optional_inputs_fall_back() {
    let inputs = parse_inputs(&["--region", "NA1", "--patchline", " ", "--config", ""]);
    assert_eq!(inputs.patchline(), "live");
    assert_eq!(inputs.installer_config(), "NA1");
}

#[test]
fn boolean_inputs_take_explicit_values() {
    let inputs = parse_inputs(&[
        "--region",
        "NA1",
        "--full-install",
        "TRUE",
        "--install-pengu",
        "False",
    ]);
    assert!(inputs.full_install);
    assert!(!inputs.install_pengu);
}

#[test]
fn blank_region_is_rejected() {
    let inputs = parse_inputs(&["--region", "  "]);
    let err = inputs.validate().expect_err("blank region must fail");
    assert!(err.to_string().contains("region"));
}

#[test]
fn settings_default_without_file() {
    let settings = Settings::load(None).expect("defaults must load");
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.timing.poll_interval, Duration::from_secs(15));
    assert_eq!(settings.timing.file_wait, Duration::from_secs(60));
    assert_eq!(settings.timing.overall, None);
    assert_eq!(settings.install.path, "C:\\Riot Games");
    assert_eq!(settings.install.product, "league_of_legends");
}

#[test]
fn settings_override_selected_fields() {
    let settings = Settings::from_toml_str(
        r#"
[install]
create_shortcut = true

[timing]
poll_interval = "2s"
overall = "1h 30m"
"#,
    )
    .expect("settings must parse");

    assert!(settings.install.create_shortcut);
    assert_eq!(settings.install.path, "C:\\Riot Games");
    assert_eq!(settings.timing.poll_interval, Duration::from_secs(2));
    assert_eq!(settings.timing.overall, Some(Duration::from_secs(5400)));
    assert_eq!(settings.timing.eula_delay, Duration::from_secs(5));
}

#[test]
fn settings_reject_bad_durations_and_unknown_keys() {
    Settings::from_toml_str("[timing]\npoll_interval = \"soon\"\n")
        .expect_err("bad duration must fail");

    Settings::from_toml_str("[timing]\npol_interval = \"1s\"\n")
        .expect_err("unknown key must fail");
}

#[test]
fn settings_file_errors_name_the_path() {
    let dir = test_dir("settings");
    let path = dir.join("clientstrap.toml");
    std::fs::write(&path, "[urls]\nleague_no_vgk = 3\n").expect("must write settings");

    let err = Settings::load(Some(&path)).expect_err("wrong type must fail");
    assert!(format!("{err:#}").contains("clientstrap.toml"), "{err:#}");

    let missing = dir.join("missing.toml");
    let err = Settings::load(Some(&missing)).expect_err("missing file must fail");
    assert!(err.to_string().contains("missing.toml"), "{err}");
}

#[test]
fn installer_url_lowercases_patchline_and_config() {
    let settings = Settings::default();
    assert_eq!(
        settings.urls.installer_url("PBE", "PBE1"),
        "https://lol.secure.dyn.riotcdn.net/channels/public/x/installer/current/pbe.pbe1.exe"
    );

    let mut urls = settings.urls.clone();
    urls.installer_base = "http://mirror.local/installer/".to_string();
    assert_eq!(
        urls.installer_url("live", "na1"),
        "http://mirror.local/installer/live.na1.exe"
    );
}

#[test]
fn debug_input_lowers_the_default_filter() {
    assert_eq!(default_directive(true), "debug");
    assert_eq!(default_directive(false), "info");
}

#[test]
fn output_sink_appends_lines_to_file() {
    let dir = test_dir("outputs");
    let path = dir.join("github_output");
    std::fs::write(&path, "earlier=1\n").expect("must seed output file");

    let sink = OutputSink::to_file(&path);
    sink.publish_all(&[
        ActionOutput::plain("rcs-port", "51234"),
        ActionOutput::secret("rcs-password", "hunter2"),
    ])
    .expect("must publish");

    let written = std::fs::read_to_string(&path).expect("must read output file");
    assert_eq!(written, "earlier=1\nrcs-port=51234\nrcs-password=hunter2\n");
}

#[test]
fn output_lines_must_be_single_line() {
    assert_eq!(
        render_output_line("lcu-port", "4242").expect("single line"),
        "lcu-port=4242"
    );
    render_output_line("lcu-directory", "a\nb").expect_err("newline must be rejected");
}

#[test]
fn output_style_is_plain_off_terminal_or_with_no_color() {
    assert_eq!(resolve_output_style(true, false), OutputStyle::Rich);
    assert_eq!(resolve_output_style(true, true), OutputStyle::Plain);
    assert_eq!(resolve_output_style(false, false), OutputStyle::Plain);
}

#[test]
fn progress_descriptions_cover_each_shape() {
    let patching = InstallProgress::in_progress(42.4, json!({}));
    assert_eq!(
        describe_progress("League Client", &patching),
        "Installing League Client... 42%"
    );

    let bytes = InstallProgress::from_bytes(
        ByteProgress {
            required: 4_000_000,
            complete: 1_000_000,
            per_second: 2_500_000.0,
        },
        json!({}),
    );
    let line = describe_progress("LCU", &bytes);
    assert!(line.starts_with("LCU updating: 25% ("), "{line}");
    assert!(line.ends_with("left, 2.50 MB/s)"), "{line}");

    let unknown = InstallProgress::unknown(json!({"action": "Checking"}));
    assert!(describe_progress("LCU", &unknown).contains("Checking"));
}

#[test]
fn progress_line_is_rich_only() {
    assert_eq!(
        render_progress_line(OutputStyle::Plain, "LCU", 50.0, None),
        None
    );
    let line = render_progress_line(
        OutputStyle::Rich,
        "LCU",
        50.0,
        Some(Duration::from_millis(1_250)),
    )
    .expect("rich line");
    assert!(line.contains("=========---------"), "{line}");
    assert!(line.contains(" 50%"), "{line}");
    assert!(line.ends_with("complete in 1.250s"), "{line}");
    assert_eq!(format_elapsed(Duration::from_millis(61_005)), "61.005s");
}

#[test]
fn endpoint_paths_follow_product_and_install_id() {
    let ctx = test_context("paths", &["--region", "EUW1", "--patchline", "PBE"]);
    assert_eq!(ctx.install_id(), "league_of_legends.pbe");
    assert_eq!(
        patch_job_path("league_of_legends", "PBE"),
        "/patch-proxy/v1/priority-patch-jobs/products/league_of_legends/patchlines/PBE"
    );
    assert_eq!(
        install_status_path("league_of_legends.pbe"),
        "/patch/v1/installs/league_of_legends.pbe/status"
    );
    assert_eq!(
        product_state_path("league_of_legends"),
        "/lol-patch/v1/products/league_of_legends/state"
    );
    assert_eq!(
        launch_args("league_of_legends", "live", "EUW1"),
        vec![
            "--launch-product=league_of_legends",
            "--launch-patchline=live",
            "--region=EUW1",
        ]
    );
}

#[test]
fn install_record_requires_a_path() {
    let dir = install_record_directory(&json!({"path": "/riot/League of Legends"}))
        .expect("path must be read");
    assert_eq!(dir, PathBuf::from("/riot/League of Legends"));

    install_record_directory(&json!({"path": ""})).expect_err("empty path must fail");
    install_record_directory(&json!({"id": "x"})).expect_err("missing path must fail");
}

#[test]
fn outputs_mask_passwords_and_name_directories() {
    let rcs = Lockfile::parse("Riot Client:100:51000:rcs-secret:https").expect("rcs lockfile");
    let lcu = Lockfile::parse("LeagueClient:200:52000:lcu-secret:https").expect("lcu lockfile");
    let riot_client = RiotClientInstall {
        executable: PathBuf::from("/riot/Riot Client/RiotClientServices.exe"),
        directory: PathBuf::from("/riot/Riot Client"),
    };
    let league = LeagueClientInstall::from_directory(PathBuf::from("/riot/League of Legends"));

    let outputs = collect_outputs(&rcs, &riot_client, &lcu, &league, &PathBuf::from("/tmp/pengu"));
    let names: Vec<_> = outputs.iter().map(|output| output.name).collect();
    assert_eq!(
        names,
        vec![
            "rcs-password",
            "rcs-port",
            "rcs-directory",
            "lcu-password",
            "lcu-port",
            "lcu-directory",
            "pengu-directory",
        ]
    );
    let secrets: Vec<_> = outputs
        .iter()
        .filter(|output| output.secret)
        .map(|output| output.value.as_str())
        .collect();
    assert_eq!(secrets, vec!["rcs-secret", "lcu-secret"]);
    assert_eq!(outputs[1].value, "51000");
    assert_eq!(outputs[2].value, "/riot/Riot Client/RiotClientServices.exe");
    assert_eq!(outputs[5].value, "/riot/League of Legends");
    assert_eq!(
        league.executable.file_name().and_then(|name| name.to_str()),
        Some("LeagueClient.exe")
    );
}

#[derive(Clone, Default)]
struct FakeClients {
    status_calls: Arc<AtomicUsize>,
    state_calls: Arc<AtomicUsize>,
    eula_accepts: Arc<AtomicUsize>,
    patch_jobs: Arc<Mutex<Vec<Value>>>,
    status_missing: bool,
    state_unavailable: bool,
}

async fn queue_patch_job(State(fake): State<FakeClients>, Json(body): Json<Value>) -> StatusCode {
    fake.patch_jobs.lock().expect("lock").push(body);
    StatusCode::NO_CONTENT
}

async fn install_status(State(fake): State<FakeClients>) -> Response {
    if fake.status_missing {
        return (StatusCode::NOT_FOUND, "unknown install").into_response();
    }
    match fake.status_calls.fetch_add(1, Ordering::SeqCst) {
        0 => Json(json!({"patch": {"state": "patching", "progress": {"progress": 50.0}}}))
            .into_response(),
        _ => Json(json!({"patch": {"state": "up_to_date"}})).into_response(),
    }
}

async fn install_record() -> Json<Value> {
    Json(json!({"id": "league_of_legends.live", "path": "/riot/League of Legends"}))
}

async fn accept(State(fake): State<FakeClients>) -> StatusCode {
    fake.eula_accepts.fetch_add(1, Ordering::SeqCst);
    StatusCode::NO_CONTENT
}

async fn product_state(State(fake): State<FakeClients>) -> Response {
    let call = fake.state_calls.fetch_add(1, Ordering::SeqCst);
    if fake.state_unavailable {
        return (StatusCode::SERVICE_UNAVAILABLE, "restarting").into_response();
    }
    match call {
        0 => (StatusCode::SERVICE_UNAVAILABLE, "plugins loading").into_response(),
        1 => Json(json!({
            "action": "Patching",
            "components": [{"progress": {
                "total": {"bytesRequired": 100, "bytesComplete": 40},
                "network": {"bytesPerSecond": 1000.0}
            }}]
        }))
        .into_response(),
        _ => Json(json!({"action": "Idle"})).into_response(),
    }
}

async fn spawn_fake_clients(fake: FakeClients) -> ControlApiClient {
    let router = Router::new()
        .route(
            "/patch-proxy/v1/priority-patch-jobs/products/league_of_legends/patchlines/live",
            put(queue_patch_job),
        )
        .route(
            "/patch/v1/installs/league_of_legends.live/status",
            get(install_status),
        )
        .route("/patch/v1/installs/league_of_legends.live", get(install_record))
        .route(EULA_ACCEPTANCE_PATH, put(accept))
        .route(
            "/lol-patch/v1/products/league_of_legends/state",
            get(product_state),
        )
        .with_state(fake);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind fake clients");
    let port = listener.local_addr().expect("local addr").port();
    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("fake clients must serve");
    });
    ControlApiClient::connect(Endpoint::http(port), "secret").expect("must build client")
}

fn session(client: ControlApiClient) -> RiotClientSession {
    RiotClientSession {
        client,
        lockfile_path: PathBuf::from("/unused/lockfile"),
    }
}

#[tokio::test]
async fn league_client_install_queues_job_and_waits_for_up_to_date() {
    let ctx = test_context("league-install", &["--region", "EUW1"]);
    let fake = FakeClients::default();
    let rcs = session(spawn_fake_clients(fake.clone()).await);

    let league = install_league_client(&ctx, &rcs)
        .await
        .expect("install must finish");

    assert_eq!(league.directory, PathBuf::from("/riot/League of Legends"));
    assert_eq!(
        league.lockfile_path,
        PathBuf::from("/riot/League of Legends").join("lockfile")
    );
    assert_eq!(fake.status_calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        *fake.patch_jobs.lock().expect("lock"),
        vec![json!({"createShortcut": false, "installPath": "C:\\Riot Games"})]
    );
}

#[tokio::test]
async fn league_client_install_fails_when_status_is_unavailable() {
    let ctx = test_context("league-missing", &["--region", "EUW1"]);
    let fake = FakeClients {
        status_missing: true,
        ..FakeClients::default()
    };
    let rcs = session(spawn_fake_clients(fake).await);

    let err = install_league_client(&ctx, &rcs)
        .await
        .expect_err("missing status must fail");
    let message = format!("{err:#}");
    assert!(message.contains("Failed to get Riot Client install status"), "{message}");
    assert!(message.contains("404"), "{message}");
}

#[tokio::test]
async fn eula_acceptance_puts_once() {
    let ctx = test_context("eula", &["--region", "EUW1"]);
    let fake = FakeClients::default();
    let rcs = session(spawn_fake_clients(fake.clone()).await);

    accept_eula(&ctx, &rcs).await.expect("eula must be accepted");
    assert_eq!(fake.eula_accepts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn full_install_ignores_failed_first_request_then_polls_to_idle() {
    let ctx = test_context("full-install", &["--region", "EUW1", "--full-install", "true"]);
    let fake = FakeClients::default();
    let lcu = spawn_fake_clients(fake.clone()).await;

    warm_up_league_client(&ctx, &lcu)
        .await
        .expect("failed first request must be ignored");
    install_league_of_legends(&ctx, &lcu)
        .await
        .expect("install must reach idle");

    assert_eq!(fake.state_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn full_install_fails_on_first_unsuccessful_state() {
    let ctx = test_context("full-install-down", &["--region", "EUW1", "--full-install", "true"]);
    let fake = FakeClients {
        state_unavailable: true,
        ..FakeClients::default()
    };
    let lcu = spawn_fake_clients(fake.clone()).await;

    let err = install_league_of_legends(&ctx, &lcu)
        .await
        .expect_err("unavailable state must fail");
    let message = format!("{err:#}");
    assert!(message.contains("Failed to get LCU state"), "{message}");
    assert!(message.contains("503"), "{message}");
    assert_eq!(fake.state_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn settings_seeding_skips_empty_payloads() {
    let ctx = test_context(
        "seed",
        &["--region", "EUW1", "--client-settings", "aW5zdGFsbDogdHJ1ZQo="],
    );

    let written = seed_client_settings(&ctx).await.expect("seeding must succeed");
    assert_eq!(written, 1);
    let content = std::fs::read_to_string(ctx.layout.client_settings_path())
        .expect("client settings must be written");
    assert_eq!(content, "install: true\n");
    assert!(!ctx.layout.cookies_path().exists());
}

#[tokio::test]
async fn closing_an_absent_riot_client_closes_nothing() {
    let ctx = test_context("close", &["--region", "EUW1"]);
    assert_eq!(close_riot_client(&ctx).await.expect("must succeed"), 0);
}
