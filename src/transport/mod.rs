//! Delivery sinks and HTTP handlers for the two transports.

pub mod sse;
pub mod ws;

use tracing::{info, Instrument};

use crate::server::AppState;
use crate::tail::{DeliverySink, SessionReport, TailConfig, TailEngine};

pub use sse::{sse_log_stream, EventStreamSink};
pub use ws::{ws_log_stream, WebSocketSink};

/// Run one tail session for a freshly connected client.
///
/// The session is counted in [`AppState::active_sessions`] for as long as it runs.
pub(crate) async fn run_session<S>(
    state: &AppState,
    sink: &mut S,
    config: TailConfig,
) -> SessionReport
where
    S: DeliverySink,
{
    let guard = state.begin_session();
    let span = tracing::info_span!("tail_session", id = guard.id(), transport = sink.transport());

    async move {
        info!(path = %state.log_path().display(), "client connected");

        let engine = TailEngine::new(state.log_path(), config);
        let report = engine.run(sink, state.shutdown()).await;

        info!(
            units = report.units,
            offset = report.offset,
            failed = report.termination.is_failure(),
            "client session ended"
        );
        drop(guard);
        report
    }
    .instrument(span)
    .await
}
