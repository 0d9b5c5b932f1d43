use std::path::Path;
use std::time::Duration;

use clientstrap_core::{Deadline, Error, Lockfile, Result};
use tracing::debug;

pub const DEFAULT_FILE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Polls for a path to appear. No filesystem notifications, just `exists()` on a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileWaiter {
    interval: Duration,
}

impl Default for FileWaiter {
    fn default() -> Self {
        Self {
            interval: DEFAULT_FILE_POLL_INTERVAL,
        }
    }
}

impl FileWaiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }

    /// Returns once `path` exists. The deadline is checked on every iteration and
    /// sleeps are cut short so they never run past it.
    pub async fn wait_for(&self, path: &Path, deadline: Option<Deadline>) -> Result<()> {
        loop {
            if path.exists() {
                return Ok(());
            }

            let nap = match deadline {
                Some(deadline) if deadline.is_expired() => {
                    return Err(Error::timeout(format!(
                        "waiting for {} to appear",
                        path.display()
                    )));
                }
                Some(deadline) => deadline.remaining().min(self.interval),
                None => self.interval,
            };
            tokio::time::sleep(nap).await;
        }
    }
}

/// Reads a lockfile that was only just created, retrying torn reads.
///
/// The owning process writes the lockfile after creating it, so the first read can
/// see a partial line. Only [`Error::MalformedLockfile`] is retried, at most
/// `attempts` reads in total.
pub async fn read_lockfile_settled(path: &Path, attempts: u32, delay: Duration) -> Result<Lockfile> {
    let mut attempt = 1;
    loop {
        match Lockfile::read(path) {
            Err(Error::MalformedLockfile { reason }) if attempt < attempts => {
                debug!(attempt, %reason, "lockfile not fully written yet");
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
            result => return result,
        }
    }
}
