//! Drives a patch or install to completion by polling a status endpoint.
//!
//! The same loop serves endpoints with different JSON shapes. Each shape gets
//! a [`ProgressExtractor`] that turns one status document into an
//! [`InstallProgress`].

use std::time::Duration;

use clientstrap_api::{ControlApiClient, FailurePolicy};
use clientstrap_core::{
    pause, ByteProgress, Deadline, Error, InstallProgress, Result,
};
use serde_json::Value;
use tracing::warn;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Anything that can answer a status GET. [`ControlApiClient`] is the real one.
#[allow(async_fn_in_trait)]
pub trait StatusSource {
    async fn fetch_status(
        &self,
        path: &str,
        policy: FailurePolicy,
        deadline: Option<Deadline>,
    ) -> Result<Option<Value>>;
}

impl StatusSource for ControlApiClient {
    async fn fetch_status(
        &self,
        path: &str,
        policy: FailurePolicy,
        deadline: Option<Deadline>,
    ) -> Result<Option<Value>> {
        self.get_json(path, policy, deadline).await
    }
}

pub trait ProgressExtractor {
    fn extract(&self, status: Value) -> Result<InstallProgress>;
}

/// `/patch/v1/installs/{id}/status`: `{patch:{state, progress:{progress}}}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatchStatusExtractor;

impl PatchStatusExtractor {
    pub const UP_TO_DATE: &'static str = "up_to_date";
}

impl ProgressExtractor for PatchStatusExtractor {
    fn extract(&self, status: Value) -> Result<InstallProgress> {
        let state = status
            .pointer("/patch/state")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::protocol(format!("status has no patch.state: {status}")))?;
        if state == Self::UP_TO_DATE {
            return Ok(InstallProgress::up_to_date(status));
        }

        match status
            .pointer("/patch/progress/progress")
            .and_then(Value::as_f64)
        {
            Some(percent) => Ok(InstallProgress::in_progress(percent as f32, status)),
            None => Ok(InstallProgress::unknown(status)),
        }
    }
}

/// `/lol-patch/v1/products/{product}/state`: byte counters under `components[0].progress`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductStateExtractor;

impl ProductStateExtractor {
    pub const IDLE: &'static str = "Idle";
}

impl ProgressExtractor for ProductStateExtractor {
    fn extract(&self, status: Value) -> Result<InstallProgress> {
        let action = status
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::protocol(format!("product state has no action: {status}")))?;
        if action == Self::IDLE {
            return Ok(InstallProgress::up_to_date(status));
        }

        let progress = status.pointer("/components/0/progress");
        let required = progress
            .and_then(|p| p.pointer("/total/bytesRequired"))
            .and_then(Value::as_u64);
        let complete = progress
            .and_then(|p| p.pointer("/total/bytesComplete"))
            .and_then(Value::as_u64);
        let per_second = progress
            .and_then(|p| p.pointer("/network/bytesPerSecond"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);

        match (required, complete) {
            (Some(required), Some(complete)) => Ok(InstallProgress::from_bytes(
                ByteProgress {
                    required,
                    complete,
                    per_second,
                },
                status,
            )),
            _ => Ok(InstallProgress::unknown(status)),
        }
    }
}

/// What to do when the status endpoint returns no document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingStatus {
    #[default]
    Fail,
    /// Keep polling through up to `attempts` consecutive misses.
    Retry { attempts: u32 },
}

impl MissingStatus {
    fn tolerates(self, consecutive_misses: u32) -> bool {
        match self {
            Self::Fail => false,
            Self::Retry { attempts } => consecutive_misses <= attempts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub on_error: FailurePolicy,
    pub on_missing: MissingStatus,
    pub deadline: Option<Deadline>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            on_error: FailurePolicy::Propagate,
            on_missing: MissingStatus::Fail,
            deadline: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    AwaitingFirstStatus,
    InProgress,
    UpToDate,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    pub polls: u32,
    pub final_status: Value,
}

pub struct InstallPoller<'a, S, E> {
    source: &'a S,
    path: String,
    extractor: E,
    config: PollConfig,
    phase: PollPhase,
    polls: u32,
}

impl<'a, S, E> InstallPoller<'a, S, E>
where
    S: StatusSource,
    E: ProgressExtractor,
{
    pub fn new(source: &'a S, path: impl Into<String>, extractor: E) -> Self {
        Self {
            source,
            path: path.into(),
            extractor,
            config: PollConfig::default(),
            phase: PollPhase::AwaitingFirstStatus,
            polls: 0,
        }
    }

    pub fn with_config(mut self, config: PollConfig) -> Self {
        self.config = config;
        self
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Polls until the endpoint reports up to date. `on_progress` sees every
    /// non-terminal reading and has no say in the loop.
    pub async fn run<F>(&mut self, mut on_progress: F) -> Result<PollOutcome>
    where
        F: FnMut(&InstallProgress),
    {
        let result = self.drive(&mut on_progress).await;
        if result.is_err() {
            self.phase = PollPhase::Failed;
        }
        result
    }

    async fn drive<F>(&mut self, on_progress: &mut F) -> Result<PollOutcome>
    where
        F: FnMut(&InstallProgress),
    {
        let mut consecutive_misses = 0_u32;
        loop {
            self.polls += 1;
            let status = self
                .source
                .fetch_status(&self.path, self.config.on_error, self.config.deadline)
                .await?;

            match status {
                None => {
                    consecutive_misses += 1;
                    if !self.config.on_missing.tolerates(consecutive_misses) {
                        return Err(Error::protocol(format!(
                            "{} returned no status after {} attempt(s)",
                            self.path, consecutive_misses
                        )));
                    }
                    warn!(path = %self.path, consecutive_misses, "status missing, polling again");
                }
                Some(status) => {
                    consecutive_misses = 0;
                    let progress = self.extractor.extract(status)?;
                    if progress.is_done() {
                        self.phase = PollPhase::UpToDate;
                        return Ok(PollOutcome {
                            polls: self.polls,
                            final_status: progress.raw,
                        });
                    }
                    self.phase = PollPhase::InProgress;
                    on_progress(&progress);
                }
            }

            pause(
                self.config.interval,
                self.config.deadline,
                &format!("polling {}", self.path),
            )
            .await?;
        }
    }
}
