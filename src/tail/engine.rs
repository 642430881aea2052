use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::error::TailError;
use super::framer::LineUnit;
use super::growth::Growth;
use super::session::{TailSession, TailState};
use super::shutdown::Shutdown;
use super::sink::DeliverySink;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_CHUNK_SIZE: usize = 1024;
/// Longest UTF-8 sequence; smaller reads could hold only part of a character.
pub const MIN_CHUNK_SIZE: usize = 4;

/// Where a new session starts reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartPosition {
    /// Offset 0: the whole current file, then new lines.
    #[default]
    Beginning,
    /// The file size at connect time: only lines appended afterwards.
    End,
}

/// How much is read per delivery step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadGranularity {
    /// Up to `chunk_size` bytes per read, framed into many units.
    #[default]
    Chunked,
    /// One line per read.
    Lines,
}

impl FromStr for StartPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "beginning" | "start" => Ok(StartPosition::Beginning),
            "end" => Ok(StartPosition::End),
            other => Err(format!(
                "unknown start position '{}', expected 'beginning' or 'end'",
                other
            )),
        }
    }
}

impl FromStr for ReadGranularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chunked" => Ok(ReadGranularity::Chunked),
            "lines" => Ok(ReadGranularity::Lines),
            other => Err(format!(
                "unknown read granularity '{}', expected 'chunked' or 'lines'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TailConfig {
    pub poll_interval: Duration,
    pub chunk_size: usize,
    pub start: StartPosition,
    pub granularity: ReadGranularity,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            chunk_size: DEFAULT_CHUNK_SIZE,
            start: StartPosition::Beginning,
            granularity: ReadGranularity::Chunked,
        }
    }
}

impl TailConfig {
    pub fn with_granularity(mut self, granularity: ReadGranularity) -> Self {
        self.granularity = granularity;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The consumer went away (send failure or closed stream).
    PeerGone,
    /// The server is shutting down.
    Shutdown,
}

/// Why a session ended.
#[derive(Debug)]
pub enum Termination {
    Disconnected(DisconnectReason),
    Failed(TailError),
}

impl Termination {
    pub fn is_failure(&self) -> bool {
        matches!(self, Termination::Failed(_))
    }
}

/// Summary of a finished session.
#[derive(Debug)]
pub struct SessionReport {
    /// Line units handed to the sink, diagnostics excluded.
    pub units: u64,
    /// Final tracked offset.
    pub offset: u64,
    pub termination: Termination,
}

/// Incremental tail loop: wait for growth, read the new bytes, frame them and
/// hand each unit to a [`DeliverySink`]. One run per client connection.
#[derive(Debug, Clone)]
pub struct TailEngine {
    path: PathBuf,
    config: TailConfig,
}

impl TailEngine {
    pub fn new(path: impl Into<PathBuf>, config: TailConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &TailConfig {
        &self.config
    }

    /// Run one session to completion.
    ///
    /// The file handle is owned by the session and released on every exit
    /// path: peer disconnect, shutdown, and file errors alike.
    pub async fn run<S>(&self, sink: &mut S, mut shutdown: Shutdown) -> SessionReport
    where
        S: DeliverySink + ?Sized,
    {
        let mut session = match TailSession::open(&self.path, self.config.start).await {
            Ok(session) => session,
            Err(err) => {
                report_failure(sink, &err).await;
                return SessionReport {
                    units: 0,
                    offset: 0,
                    termination: Termination::Failed(err),
                };
            }
        };

        debug!(
            path = %session.path().display(),
            offset = session.offset(),
            transport = sink.transport(),
            "tail session opened"
        );

        let mut units = 0;
        let termination = self
            .drive(&mut session, sink, &mut shutdown, &mut units)
            .await;

        match &termination {
            Termination::Disconnected(reason) => {
                session.transition(TailState::Disconnected);
                debug!(?reason, units, offset = session.offset(), "tail session disconnected");
            }
            Termination::Failed(err) => {
                session.transition(TailState::Failed);
                report_failure(sink, err).await;
            }
        }

        let offset = session.offset();
        drop(session);

        SessionReport {
            units,
            offset,
            termination,
        }
    }

    async fn drive<S>(
        &self,
        session: &mut TailSession,
        sink: &mut S,
        shutdown: &mut Shutdown,
        units: &mut u64,
    ) -> Termination
    where
        S: DeliverySink + ?Sized,
    {
        loop {
            if shutdown.is_triggered() {
                return Termination::Disconnected(DisconnectReason::Shutdown);
            }

            session.transition(TailState::Polling);
            let size = match session.poll().await {
                Ok(Growth::Available { size }) => Some(size),
                Ok(Growth::Unchanged) => None,
                Err(err) => return Termination::Failed(err),
            };

            if let Some(size) = size {
                let batch = match session
                    .read_new(size, self.config.granularity, self.config.chunk_size)
                    .await
                {
                    Ok(batch) => batch,
                    Err(err) => return Termination::Failed(err),
                };

                // An incomplete trailing line yields an empty batch: wait for it.
                if !batch.is_empty() {
                    session.transition(TailState::Delivering);
                    for unit in &batch {
                        if !sink.is_connected() {
                            return Termination::Disconnected(DisconnectReason::PeerGone);
                        }
                        tokio::select! {
                            delivered = sink.deliver(unit) => {
                                if !delivered {
                                    return Termination::Disconnected(DisconnectReason::PeerGone);
                                }
                            }
                            _ = shutdown.triggered() => {
                                return Termination::Disconnected(DisconnectReason::Shutdown);
                            }
                        }
                        *units += 1;
                    }
                    continue;
                }
            }

            session.transition(TailState::Waiting);
            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = shutdown.triggered() => {
                    return Termination::Disconnected(DisconnectReason::Shutdown);
                }
            }
            if !sink.is_connected() {
                return Termination::Disconnected(DisconnectReason::PeerGone);
            }
        }
    }
}

/// Log a session-ending file error and send the client a best-effort diagnostic.
async fn report_failure<S>(sink: &mut S, err: &TailError)
where
    S: DeliverySink + ?Sized,
{
    match err {
        TailError::NotFound { path } => {
            warn!(path = %path.display(), "log file not found");
        }
        TailError::ReadFailure { path, source } => {
            error!(path = %path.display(), error = %source, "error reading log file");
        }
    }

    if sink.is_connected() && !sink.deliver(&LineUnit::diagnostic(err.to_string())).await {
        debug!(transport = sink.transport(), "diagnostic not delivered, peer gone");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tail::shutdown::{self, ShutdownTrigger};
    use crate::tail::sink::testing::CollectingSink;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tokio::task::JoinHandle;

    const FAST_POLL: Duration = Duration::from_millis(10);
    const WAIT_ATTEMPTS: usize = 200;

    fn fast_config() -> TailConfig {
        TailConfig {
            poll_interval: FAST_POLL,
            ..TailConfig::default()
        }
    }

    fn append(path: &Path, content: &str) {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
    }

    fn spawn_engine(
        path: &Path,
        config: TailConfig,
    ) -> (CollectingSink, ShutdownTrigger, JoinHandle<SessionReport>) {
        let sink = CollectingSink::default();
        let (trigger, shutdown) = shutdown::channel();
        let engine = TailEngine::new(path, config);
        let mut task_sink = sink.clone();
        let handle = tokio::spawn(async move { engine.run(&mut task_sink, shutdown).await });
        (sink, trigger, handle)
    }

    async fn wait_for_units(sink: &CollectingSink, count: usize) {
        for _ in 0..WAIT_ATTEMPTS {
            if sink.units().len() >= count {
                return;
            }
            tokio::time::sleep(FAST_POLL).await;
        }
        panic!(
            "timed out waiting for {} units, got {:?}",
            count,
            sink.units()
        );
    }

    async fn finish(handle: JoinHandle<SessionReport>) -> SessionReport {
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("session did not terminate")
            .unwrap()
    }

    #[test]
    fn parses_start_and_granularity() {
        assert_eq!("END".parse::<StartPosition>(), Ok(StartPosition::End));
        assert_eq!("beginning".parse::<StartPosition>(), Ok(StartPosition::Beginning));
        assert_eq!("lines".parse::<ReadGranularity>(), Ok(ReadGranularity::Lines));
        assert!("middle".parse::<StartPosition>().is_err());
        assert!("bytes".parse::<ReadGranularity>().is_err());
    }

    #[tokio::test]
    async fn delivers_existing_then_appended_lines_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "a\n");

        let (sink, _trigger, handle) = spawn_engine(&path, fast_config());
        wait_for_units(&sink, 1).await;

        append(&path, "b\n");
        wait_for_units(&sink, 2).await;

        // A few more idle cycles must not repeat anything.
        tokio::time::sleep(FAST_POLL * 5).await;
        let wire: Vec<String> = sink.units().iter().map(LineUnit::as_wire).collect();
        assert_eq!(wire, vec!["a\n", "b\n"]);

        sink.close();
        let report = finish(handle).await;
        assert_eq!(report.units, 2);
        assert_eq!(report.offset, 4);
        assert!(matches!(
            report.termination,
            Termination::Disconnected(DisconnectReason::PeerGone)
        ));
    }

    #[tokio::test]
    async fn missing_file_emits_one_diagnostic_and_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.log");

        let (sink, _trigger, handle) = spawn_engine(&path, fast_config());
        let report = finish(handle).await;

        let units = sink.units();
        assert_eq!(units.len(), 1);
        assert_eq!(
            units[0].content(),
            format!("Error: Log file not found at {}", path.display())
        );
        assert_eq!(report.units, 0);
        assert!(matches!(
            report.termination,
            Termination::Failed(TailError::NotFound { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unreadable_path_emits_read_error_and_fails() {
        // A directory opens but cannot be read as a file.
        let dir = tempfile::tempdir().unwrap();

        let (sink, _trigger, handle) = spawn_engine(dir.path(), fast_config());
        let report = finish(handle).await;

        let units = sink.units();
        assert_eq!(units.len(), 1);
        assert!(units[0].content().starts_with("Error reading log file:"));
        assert_eq!(report.units, 0);
        assert!(matches!(
            report.termination,
            Termination::Failed(TailError::ReadFailure { .. })
        ));
    }

    #[tokio::test]
    async fn idle_file_delivers_nothing_and_stays_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quiet.log");
        append(&path, "");

        let (sink, _trigger, handle) = spawn_engine(&path, fast_config());
        tokio::time::sleep(FAST_POLL * 10).await;

        assert!(sink.units().is_empty());
        assert!(!handle.is_finished());

        sink.close();
        let report = finish(handle).await;
        assert!(matches!(
            report.termination,
            Termination::Disconnected(DisconnectReason::PeerGone)
        ));
    }

    #[tokio::test]
    async fn peer_close_during_wait_ends_within_one_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "");

        let interval = Duration::from_millis(200);
        let config = TailConfig {
            poll_interval: interval,
            ..TailConfig::default()
        };
        let (sink, _trigger, handle) = spawn_engine(&path, config);
        tokio::time::sleep(Duration::from_millis(50)).await;

        sink.close();
        let report = tokio::time::timeout(interval * 2, handle)
            .await
            .expect("not disconnected within one wait interval")
            .unwrap();
        assert!(matches!(
            report.termination,
            Termination::Disconnected(DisconnectReason::PeerGone)
        ));
    }

    #[tokio::test]
    async fn shutdown_interrupts_wait() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "");

        let config = TailConfig {
            poll_interval: Duration::from_secs(30),
            ..TailConfig::default()
        };
        let (_sink, trigger, handle) = spawn_engine(&path, config);
        tokio::time::sleep(Duration::from_millis(50)).await;

        trigger.fire();
        let report = finish(handle).await;
        assert!(matches!(
            report.termination,
            Termination::Disconnected(DisconnectReason::Shutdown)
        ));
    }

    #[tokio::test]
    async fn partial_line_is_withheld_until_terminated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "par");

        let (sink, _trigger, handle) = spawn_engine(&path, fast_config());
        tokio::time::sleep(FAST_POLL * 5).await;
        assert!(sink.units().is_empty());

        append(&path, "tial\n");
        wait_for_units(&sink, 1).await;
        assert_eq!(sink.units()[0].as_wire(), "partial\n");

        sink.close();
        finish(handle).await;
    }

    #[tokio::test]
    async fn line_granularity_withholds_partial_line_too() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "one\ntw");

        let config = fast_config().with_granularity(ReadGranularity::Lines);
        let (sink, _trigger, handle) = spawn_engine(&path, config);
        wait_for_units(&sink, 1).await;
        tokio::time::sleep(FAST_POLL * 5).await;
        assert_eq!(sink.units().len(), 1);

        append(&path, "o\n");
        wait_for_units(&sink, 2).await;
        assert_eq!(sink.wire(), "one\ntwo\n");

        sink.close();
        finish(handle).await;
    }

    #[tokio::test]
    async fn oversized_line_is_fragmented_without_loss() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let long = format!("{}\n", "x".repeat(37));
        append(&path, &long);
        append(&path, "short\n");

        let config = TailConfig {
            chunk_size: 8,
            ..fast_config()
        };
        let (sink, _trigger, handle) = spawn_engine(&path, config);
        for _ in 0..WAIT_ATTEMPTS {
            if sink.wire().len() >= long.len() + 6 {
                break;
            }
            tokio::time::sleep(FAST_POLL).await;
        }
        assert_eq!(sink.wire(), format!("{}short\n", long));

        sink.close();
        finish(handle).await;
    }

    #[tokio::test]
    async fn delivered_stream_equals_appended_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "");

        let config = TailConfig {
            chunk_size: 16,
            ..fast_config()
        };
        let (sink, _trigger, handle) = spawn_engine(&path, config);

        let mut expected = String::new();
        for i in 0..20 {
            let line = format!("line {} {}\n", i, "-".repeat(i % 7));
            append(&path, &line);
            expected.push_str(&line);
            if i % 5 == 0 {
                tokio::time::sleep(FAST_POLL).await;
            }
        }
        wait_for_units(&sink, 20).await;
        assert_eq!(sink.wire(), expected);

        sink.close();
        finish(handle).await;
    }

    #[tokio::test]
    async fn start_at_end_skips_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "old\n");

        let config = TailConfig {
            start: StartPosition::End,
            ..fast_config()
        };
        let (sink, _trigger, handle) = spawn_engine(&path, config);
        tokio::time::sleep(FAST_POLL * 5).await;
        append(&path, "new\n");
        wait_for_units(&sink, 1).await;
        assert_eq!(sink.wire(), "new\n");

        sink.close();
        finish(handle).await;
    }

    #[tokio::test]
    async fn sessions_at_different_offsets_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "early\n");

        let (first, _t1, h1) = spawn_engine(&path, fast_config());
        wait_for_units(&first, 1).await;

        append(&path, &format!("{}\n", "g".repeat(99)));
        wait_for_units(&first, 2).await;

        let late = TailConfig {
            start: StartPosition::End,
            ..fast_config()
        };
        let (second, _t2, h2) = spawn_engine(&path, late);
        tokio::time::sleep(FAST_POLL * 5).await;

        append(&path, "shared tail\n");
        wait_for_units(&first, 3).await;
        wait_for_units(&second, 1).await;

        assert_eq!(first.units().len(), 3);
        assert_eq!(second.wire(), "shared tail\n");
        assert!(!second.wire().contains("early"));

        first.close();
        second.close();
        let r1 = finish(h1).await;
        let r2 = finish(h2).await;
        assert_eq!(r1.offset, r2.offset);
        assert_eq!(r1.units, 3);
        assert_eq!(r2.units, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn vanished_file_fails_with_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "before\n");

        let (sink, _trigger, handle) = spawn_engine(&path, fast_config());
        wait_for_units(&sink, 1).await;

        std::fs::remove_file(&path).unwrap();
        let report = finish(handle).await;

        let units = sink.units();
        assert_eq!(units.len(), 2);
        assert!(units[1].content().starts_with("Error: Log file not found at"));
        assert_eq!(report.units, 1);
        assert!(report.termination.is_failure());
    }
}
