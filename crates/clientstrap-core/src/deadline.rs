use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{Error, Result};

/// A fixed point in monotonic time after which a wait or request gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now() + timeout)
    }

    pub fn instant(self) -> Instant {
        self.0
    }

    pub fn remaining(self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(self) -> bool {
        Instant::now() >= self.0
    }

    /// Combines a phase deadline with an enclosing one; the sooner wins.
    pub fn earliest(first: Option<Self>, second: Option<Self>) -> Option<Self> {
        match (first, second) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, None) => a,
            (None, b) => b,
        }
    }
}

/// Runs `future` to completion or fails with [`Error::Timeout`] once `deadline` passes.
pub async fn with_deadline<F, T>(deadline: Option<Deadline>, operation: &str, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let Some(deadline) = deadline else {
        return future.await;
    };

    match tokio::time::timeout_at(deadline.instant(), future).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(operation)),
    }
}

/// Sleeps for `interval`, unless the deadline falls inside it: then sleeps only
/// until the deadline and reports a timeout.
pub async fn pause(interval: Duration, deadline: Option<Deadline>, operation: &str) -> Result<()> {
    match deadline {
        Some(deadline) if deadline.remaining() < interval => {
            tokio::time::sleep_until(deadline.instant()).await;
            Err(Error::timeout(operation))
        }
        _ => {
            tokio::time::sleep(interval).await;
            Ok(())
        }
    }
}
