//! Error type for analysis runs.
//!
//! Only file-level failures surface here; anything at sample granularity
//! (an undecodable frame, a malformed log line, an unmatched timestamp echo)
//! is skipped where it happens and never aborts the run.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal analysis error.
#[derive(Debug, Error)]
pub enum Error {
    /// A required capture or log file does not exist.
    #[error("missing input: {}", .0.display())]
    MissingInput(PathBuf),

    /// An input exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A capture file is not a readable Ethernet pcap.
    #[error("malformed capture {}: {reason}", path.display())]
    Capture { path: PathBuf, reason: String },

    /// The analysis parameters are unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Classifies an open/read failure, turning `NotFound` into `MissingInput`.
    pub(crate) fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            Error::MissingInput(path)
        } else {
            Error::Io { path, source }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_missing_input() {
        let err = Error::from_io("s1.pcap", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, Error::MissingInput(ref p) if p == &PathBuf::from("s1.pcap")));

        let err = Error::from_io("s1.pcap", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, Error::Io { .. }));
    }
}
