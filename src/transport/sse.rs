//! Pull transport: a Server-Sent Events stream, one `message` event per unit.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use tokio::sync::mpsc;

use super::run_session;
use crate::server::AppState;
use crate::tail::{DeliverySink, LineUnit};

/// Events buffered between the engine and the response body.
const EVENT_BUFFER: usize = 16;

/// Forwards units as events to the response body through a bounded channel.
///
/// The request is considered open for as long as the response stream holding
/// the receiver is alive; axum drops it when the client goes away.
pub struct EventStreamSink {
    tx: mpsc::Sender<Event>,
}

impl EventStreamSink {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }
}

#[async_trait::async_trait]
impl DeliverySink for EventStreamSink {
    fn transport(&self) -> &'static str {
        "event-stream"
    }

    async fn deliver(&mut self, unit: &LineUnit) -> bool {
        self.tx.send(message_event(unit)).await.is_ok()
    }

    fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Wrap a unit as `event: message` with the line as its data.
pub fn message_event(unit: &LineUnit) -> Event {
    Event::default().event("message").data(event_data(unit))
}

/// Line content with terminator, as it can be carried by an SSE `data` field.
///
/// SSE treats CR as a line break, so `\r\n` and lone `\r` are sent as `\n`.
pub fn event_data(unit: &LineUnit) -> String {
    unit.as_wire().replace("\r\n", "\n").replace('\r', "\n")
}

/// `GET /http-log-stream`
pub async fn sse_log_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let keep_alive = state.keep_alive();

    let session_state = state.clone();
    tokio::spawn(async move {
        let mut sink = EventStreamSink::new(tx);
        let config = session_state.pull_config().clone();
        run_session(&session_state, &mut sink, config).await;
    });

    let events = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (Ok::<_, Infallible>(event), rx))
    });

    Sse::new(events).keep_alive(KeepAlive::new().interval(keep_alive))
}
