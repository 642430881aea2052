use std::io;
use std::path::{Path, PathBuf};

/// File-level failures that end a tail session.
#[derive(Debug)]
pub enum TailError {
    /// The log file is absent at open time or vanished mid-stream.
    NotFound { path: PathBuf },
    /// Any other I/O failure while statting, opening or reading.
    ReadFailure { path: PathBuf, source: io::Error },
}

impl TailError {
    /// Classify an I/O error raised while touching `path`.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            TailError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            TailError::ReadFailure {
                path: path.to_path_buf(),
                source: err,
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TailError::NotFound { .. })
    }
}

// The Display text doubles as the diagnostic payload sent to clients.
impl std::fmt::Display for TailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TailError::NotFound { path } => {
                write!(f, "Error: Log file not found at {}", path.display())
            }
            TailError::ReadFailure { source, .. } => {
                write!(f, "Error reading log file: {}", source)
            }
        }
    }
}

impl std::error::Error for TailError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TailError::NotFound { .. } => None,
            TailError::ReadFailure { source, .. } => Some(source),
        }
    }
}
