use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, BufReader};
use tracing::trace;

use super::engine::{ReadGranularity, StartPosition, MIN_CHUNK_SIZE};
use super::error::TailError;
use super::framer::{frame, LineUnit};
use super::growth::{Growth, GrowthDetector};
use super::position::PositionTracker;

/// Engine state for one session. `Disconnected` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailState {
    Idle,
    Polling,
    Delivering,
    Waiting,
    Disconnected,
    Failed,
}

impl TailState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TailState::Disconnected | TailState::Failed)
    }
}

/// One client's active stream: an exclusively owned read-only handle plus the
/// offset already delivered from it. Dropping the session closes the handle.
#[derive(Debug)]
pub struct TailSession {
    path: PathBuf,
    file: File,
    position: PositionTracker,
    detector: GrowthDetector,
    state: TailState,
    live: bool,
}

impl TailSession {
    pub async fn open(path: &Path, start: StartPosition) -> Result<Self, TailError> {
        let file = File::open(path)
            .await
            .map_err(|e| TailError::from_io(path, e))?;

        let position = match start {
            StartPosition::Beginning => PositionTracker::new(),
            StartPosition::End => {
                let meta = file
                    .metadata()
                    .await
                    .map_err(|e| TailError::from_io(path, e))?;
                PositionTracker::starting_at(meta.len())
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            file,
            position,
            detector: GrowthDetector::new(path),
            state: TailState::Idle,
            live: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.position.current()
    }

    pub fn state(&self) -> TailState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub(crate) fn transition(&mut self, next: TailState) {
        if self.state != next {
            trace!(from = ?self.state, to = ?next, offset = self.offset(), "tail state");
            self.state = next;
        }
        if next.is_terminal() {
            self.live = false;
        }
    }

    pub async fn poll(&self) -> Result<Growth, TailError> {
        self.detector.poll(self.position.current()).await
    }

    /// Read the region between the tracked offset and `size` and frame it.
    ///
    /// At most `chunk_size` bytes are read (one line for `Lines`), never fewer
    /// than [`MIN_CHUNK_SIZE`] so a read always fits one whole character. Only complete
    /// lines are returned and consumed; a trailing line without a terminator
    /// stays unread unless it alone fills a whole chunk, in which case it is
    /// cut on a UTF-8 boundary so an oversized line cannot stall the stream.
    pub async fn read_new(
        &mut self,
        size: u64,
        granularity: ReadGranularity,
        chunk_size: usize,
    ) -> Result<Vec<LineUnit>, TailError> {
        let chunk_size = chunk_size.max(MIN_CHUNK_SIZE);
        let offset = self.position.current();
        let cap = size.saturating_sub(offset).min(chunk_size as u64);
        if cap == 0 {
            return Ok(Vec::new());
        }

        self.file
            .seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| TailError::from_io(&self.path, e))?;

        let mut buf = Vec::with_capacity(cap as usize);
        let read = match granularity {
            ReadGranularity::Chunked => (&mut self.file).take(cap).read_to_end(&mut buf).await,
            ReadGranularity::Lines => {
                let mut reader = BufReader::new((&mut self.file).take(cap));
                reader.read_until(b'\n', &mut buf).await
            }
        };
        read.map_err(|e| TailError::from_io(&self.path, e))?;

        let consumed = deliverable_len(&buf, chunk_size);
        if consumed == 0 {
            return Ok(Vec::new());
        }

        self.position.advance(consumed as u64);
        Ok(frame(&String::from_utf8_lossy(&buf[..consumed])))
    }
}

/// Number of leading bytes of `buf` that form deliverable units.
fn deliverable_len(buf: &[u8], chunk_size: usize) -> usize {
    match buf.iter().rposition(|&b| b == b'\n') {
        Some(last_newline) => last_newline + 1,
        None if buf.len() >= chunk_size => utf8_boundary(buf),
        None => 0,
    }
}

/// Longest prefix that does not end inside a multi-byte character.
fn utf8_boundary(buf: &[u8]) -> usize {
    match std::str::from_utf8(buf) {
        Ok(_) => buf.len(),
        Err(e) if e.error_len().is_none() && e.valid_up_to() > 0 => e.valid_up_to(),
        Err(_) => buf.len(),
    }
}
