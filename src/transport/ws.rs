//! Push transport: one WebSocket text frame per line unit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tracing::debug;

use super::run_session;
use crate::server::AppState;
use crate::tail::{DeliverySink, LineUnit};

/// Sends each unit as a text frame.
///
/// Peer closure is detected two ways: a failed send, and a background reader
/// that flips the liveness flag when the client closes or the socket errors.
/// Nothing is sent on idle cycles.
pub struct WebSocketSink {
    sender: SplitSink<WebSocket, Message>,
    open: Arc<AtomicBool>,
}

impl WebSocketSink {
    /// Close the socket if the peer is still there.
    pub async fn close(mut self) {
        if self.open.swap(false, Ordering::SeqCst) {
            if let Err(e) = self.sender.send(Message::Close(None)).await {
                debug!(error = %e, "failed to send WebSocket close frame");
            }
        }
    }
}

#[async_trait::async_trait]
impl DeliverySink for WebSocketSink {
    fn transport(&self) -> &'static str {
        "websocket"
    }

    async fn deliver(&mut self, unit: &LineUnit) -> bool {
        match self.sender.send(Message::Text(unit.as_wire())).await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "WebSocket send failed, peer gone");
                self.open.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// `GET /ws-log-stream`
pub async fn ws_log_stream(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| stream_socket(socket, state))
}

async fn stream_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, receiver) = socket.split();
    let open = Arc::new(AtomicBool::new(true));
    let watcher = tokio::spawn(watch_peer(receiver, open.clone()));

    let mut sink = WebSocketSink { sender, open };
    run_session(&state, &mut sink, state.push_config().clone()).await;

    watcher.abort();
    sink.close().await;
}

/// Drain client frames until the peer goes away. Client input is ignored.
async fn watch_peer(mut receiver: SplitStream<WebSocket>, open: Arc<AtomicBool>) {
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "WebSocket receive failed");
                break;
            }
        }
    }
    open.store(false, Ordering::SeqCst);
}
