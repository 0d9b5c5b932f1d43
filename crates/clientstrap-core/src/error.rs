use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("path does not exist: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("malformed lockfile: {reason}")]
    MalformedLockfile { reason: String },

    /// Any non-2xx answer from the control API.
    #[error("control API answered {status}: {body}")]
    UnsuccessfulResponse { status: u16, body: String },

    #[error("deadline exceeded while {operation}")]
    Timeout { operation: String },

    #[error("unexpected control API payload: {message}")]
    ProtocolViolation { message: String },

    #[error("i/o failure on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("transport failure: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl Error {
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            return Self::NotFound { path };
        }
        Self::Io { path, source }
    }

    /// HTTP status of an unsuccessful response, if that is what this error is.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnsuccessfulResponse { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
