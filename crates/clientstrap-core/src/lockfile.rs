use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::path::Path;

use crate::error::{Error, Result};

/// Connection details a locally running client publishes for its control API.
///
/// On disk this is a single line `<name>:<pid>:<port>:<password>:<protocol>`.
#[derive(Clone, PartialEq, Eq)]
pub struct Lockfile {
    pub name: String,
    pub pid: String,
    pub port: u16,
    pub password: String,
    pub protocol: String,
}

impl Lockfile {
    pub const FIELD_COUNT: usize = 5;

    pub fn parse(content: &str) -> Result<Self> {
        parse_fields(content).map_err(|reason| Error::MalformedLockfile { reason })
    }

    /// Reads the lockfile in a single pass.
    ///
    /// The producing process may rewrite or delete the file at any time, so the
    /// handle is opened with full sharing. A read racing a rewrite can still see a
    /// torn file; that surfaces as [`Error::MalformedLockfile`].
    pub fn read(path: &Path) -> Result<Self> {
        let mut content = String::new();
        open_shared(path)
            .and_then(|mut file| file.read_to_string(&mut content))
            .map_err(|err| match err.kind() {
                io::ErrorKind::InvalidData => Error::MalformedLockfile {
                    reason: format!("{} is not valid UTF-8", path.display()),
                },
                _ => Error::io(path, err),
            })?;

        parse_fields(&content).map_err(|reason| Error::MalformedLockfile {
            reason: format!("{}: {reason}", path.display()),
        })
    }
}

impl fmt::Debug for Lockfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lockfile")
            .field("name", &self.name)
            .field("pid", &self.pid)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .field("protocol", &self.protocol)
            .finish()
    }
}

fn parse_fields(content: &str) -> std::result::Result<Lockfile, String> {
    let fields = content.trim_end().split(':').collect::<Vec<_>>();
    if fields.len() < Lockfile::FIELD_COUNT {
        return Err(format!(
            "expected {} ':'-separated fields, found {}",
            Lockfile::FIELD_COUNT,
            fields.len()
        ));
    }

    let port = fields[2]
        .trim()
        .parse::<u16>()
        .map_err(|err| format!("invalid port '{}': {err}", fields[2]))?;

    Ok(Lockfile {
        name: fields[0].to_string(),
        pid: fields[1].to_string(),
        port,
        password: fields[3].to_string(),
        protocol: fields[4].to_string(),
    })
}

fn open_shared(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.read(true);

    #[cfg(windows)]
    {
        use std::os::windows::fs::OpenOptionsExt;
        // FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE
        options.share_mode(0x1 | 0x2 | 0x4);
    }

    options.open(path)
}
