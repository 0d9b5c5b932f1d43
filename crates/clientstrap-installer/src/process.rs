use std::ffi::OsStr;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use clientstrap_core::{pause, Deadline};
use futures::future::join_all;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::debug;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Matches a process image name against a bare program name, the way Windows
/// tools do: case-insensitive and without the `.exe` suffix.
pub fn matches_process_name(image: &OsStr, wanted: &str) -> bool {
    let image = image.to_string_lossy();
    let stem = image
        .len()
        .checked_sub(4)
        .filter(|split| {
            image.is_char_boundary(*split) && image[*split..].eq_ignore_ascii_case(".exe")
        })
        .map_or(&image[..], |split| &image[..split]);
    stem.eq_ignore_ascii_case(wanted)
}

fn snapshot() -> System {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    system
}

fn matching_pids(system: &System, name: &str) -> Vec<Pid> {
    system
        .processes()
        .values()
        .filter(|process| matches_process_name(process.name(), name))
        .map(|process| process.pid())
        .collect()
}

pub fn count_running(name: &str) -> usize {
    matching_pids(&snapshot(), name).len()
}

/// Kills every process called `name` and waits for all of them to exit.
///
/// Exits are awaited together; one failure does not stop the others from being
/// awaited. The first error is returned once all have settled.
pub async fn terminate_all(name: &str, deadline: Option<Deadline>) -> Result<usize> {
    let system = snapshot();
    let pids = matching_pids(&system, name);
    debug!(name, count = pids.len(), "terminating processes");

    let exits = pids.iter().map(|pid| {
        let killed = system.process(*pid).map(|process| process.kill());
        async move {
            if killed == Some(false) {
                debug!(pid = pid.as_u32(), "kill signal was not delivered");
            }
            wait_for_exit(*pid, deadline).await
        }
    });

    join_all(exits)
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;
    Ok(pids.len())
}

async fn wait_for_exit(pid: Pid, deadline: Option<Deadline>) -> Result<()> {
    let mut system = System::new();
    loop {
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        if system.process(pid).is_none() {
            return Ok(());
        }
        pause(
            EXIT_POLL_INTERVAL,
            deadline,
            &format!("waiting for pid {} to exit", pid.as_u32()),
        )
        .await?;
    }
}

/// Runs `program` and waits for it to exit. The exit status is returned as-is;
/// some installers exit non-zero after handing off to a child process.
pub async fn run_to_exit<I, A>(
    program: &Path,
    args: I,
    working_dir: Option<&Path>,
) -> Result<ExitStatus>
where
    I: IntoIterator<Item = A>,
    A: AsRef<OsStr>,
{
    let mut command = tokio::process::Command::new(program);
    command.args(args);
    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }

    let status = command
        .status()
        .await
        .with_context(|| format!("failed to run {}", program.display()))?;
    debug!(program = %program.display(), %status, "process exited");
    Ok(status)
}

/// Starts `program` without waiting for it; it keeps running after we exit.
pub fn spawn_detached<I, A>(program: &Path, args: I) -> Result<u32>
where
    I: IntoIterator<Item = A>,
    A: AsRef<OsStr>,
{
    let child = std::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to start {}", program.display()))?;
    Ok(child.id())
}
