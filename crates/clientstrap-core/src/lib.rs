mod deadline;
mod error;
mod lockfile;
mod progress;

pub use deadline::{pause, with_deadline, Deadline};
pub use error::{Error, Result};
pub use lockfile::Lockfile;
pub use progress::{ByteProgress, InstallProgress, ProgressState};
