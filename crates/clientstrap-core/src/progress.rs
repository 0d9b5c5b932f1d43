use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressState {
    InProgress,
    UpToDate,
    /// The endpoint reported a non-terminal state without a readable progress shape.
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ByteProgress {
    pub required: u64,
    pub complete: u64,
    pub per_second: f64,
}

impl ByteProgress {
    pub fn percent(&self) -> f32 {
        if self.required == 0 {
            return 0.0;
        }
        let ratio = self.complete as f64 / self.required as f64;
        (ratio * 100.0).clamp(0.0, 100.0) as f32
    }

    pub fn remaining(&self) -> u64 {
        self.required.saturating_sub(self.complete)
    }

    pub fn megabytes_per_second(&self) -> f64 {
        self.per_second / 1_000_000.0
    }
}

/// One normalized reading of an install or patch status endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallProgress {
    pub state: ProgressState,
    pub percent: f32,
    pub bytes: Option<ByteProgress>,
    pub raw: Value,
}

impl InstallProgress {
    pub fn up_to_date(raw: Value) -> Self {
        Self {
            state: ProgressState::UpToDate,
            percent: 100.0,
            bytes: None,
            raw,
        }
    }

    pub fn in_progress(percent: f32, raw: Value) -> Self {
        Self {
            state: ProgressState::InProgress,
            percent: clamp_percent(percent),
            bytes: None,
            raw,
        }
    }

    pub fn from_bytes(bytes: ByteProgress, raw: Value) -> Self {
        Self {
            state: ProgressState::InProgress,
            percent: bytes.percent(),
            bytes: Some(bytes),
            raw,
        }
    }

    pub fn unknown(raw: Value) -> Self {
        Self {
            state: ProgressState::Unknown,
            percent: 0.0,
            bytes: None,
            raw,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == ProgressState::UpToDate
    }
}

fn clamp_percent(percent: f32) -> f32 {
    if percent.is_nan() {
        return 0.0;
    }
    percent.clamp(0.0, 100.0)
}
