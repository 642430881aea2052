use std::path::{Path, PathBuf};

use super::error::TailError;

/// Outcome of one growth poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Growth {
    /// The file is larger than the tracked offset.
    Available { size: u64 },
    /// Nothing new since the tracked offset.
    Unchanged,
}

/// Decides whether a file has grown past a tracked offset.
///
/// The file is appended by another process, so every poll re-stats the path;
/// the size is never cached between cycles.
#[derive(Debug, Clone)]
pub struct GrowthDetector {
    path: PathBuf,
}

impl GrowthDetector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size of the file on disk.
    pub async fn size(&self) -> Result<u64, TailError> {
        tokio::fs::metadata(&self.path)
            .await
            .map(|meta| meta.len())
            .map_err(|e| TailError::from_io(&self.path, e))
    }

    /// Compare the current size to `offset`.
    ///
    /// A shrunken file reports `Unchanged`: truncation is not detected.
    pub async fn poll(&self, offset: u64) -> Result<Growth, TailError> {
        let size = self.size().await?;
        if size > offset {
            Ok(Growth::Available { size })
        } else {
            Ok(Growth::Unchanged)
        }
    }
}
