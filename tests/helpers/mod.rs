#![allow(dead_code)] // Test helpers appear unused when compiled independently

use logstream::cli::sse::{SseDecoder, SseEvent};
use logstream::tail::{shutdown, ShutdownTrigger};
use logstream::ServerSettings;
use reqwest::Client;
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::future::Future;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const WAIT_ATTEMPTS: usize = 50;
const WAIT_DELAY: Duration = Duration::from_millis(100);
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestServer {
    pub base_url: String,
    trigger: ShutdownTrigger,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub fn ws_url(&self) -> String {
        format!("{}/ws-log-stream", self.base_url.replacen("http://", "ws://", 1))
    }

    pub fn sse_url(&self) -> String {
        format!("{}/http-log-stream", self.base_url)
    }

    /// Fire the session shutdown signal without stopping the listener.
    pub fn shutdown_sessions(&self) {
        self.trigger.fire();
    }

    pub async fn stop(self) {
        self.trigger.fire();
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}

/// Find an available TCP port
pub async fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Best-effort check for whether binding to loopback is permitted in the current sandbox.
pub async fn can_bind_loopback() -> bool {
    match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => {
            drop(listener);
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => false,
        Err(_) => true, // treat other errors as non-fatal for skipping
    }
}

/// Server settings with short poll and keep-alive intervals.
pub fn fast_settings(log_path: &Path) -> ServerSettings {
    let mut settings = ServerSettings::new(log_path);
    settings.push.poll_interval = Duration::from_millis(20);
    settings.pull.poll_interval = Duration::from_millis(20);
    settings.keep_alive = Duration::from_millis(100);
    settings
}

/// Spawn the log stream router on a free port and wait until it is healthy.
pub async fn spawn_server(settings: ServerSettings) -> TestServer {
    let (trigger, session_shutdown) = shutdown::channel();
    let app = logstream::build_router(settings, session_shutdown);

    let port = free_port().await;
    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .expect("failed to bind log stream listener");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });
        if let Err(err) = server.await {
            eprintln!("log stream server error: {}", err);
        }
    });

    let base_url = format!("http://127.0.0.1:{}", port);
    wait_for_health(&Client::new(), &base_url).await;

    TestServer {
        base_url,
        trigger,
        shutdown_tx,
        handle,
    }
}

/// Wait for a server to respond to /health
pub async fn wait_for_health(client: &Client, base_url: &str) {
    poll_until(|| async {
        client
            .get(format!("{}/health", base_url))
            .send()
            .await
            .ok()
            .map(|_| ())
    })
    .await
    .unwrap_or_else(|| panic!("timed out waiting for {} to be healthy", base_url));
}

/// Poll /status until the active session count equals `expected`
pub async fn wait_for_sessions(client: &Client, base_url: &str, expected: u64) {
    poll_until(|| async {
        let resp = client
            .get(format!("{}/status", base_url))
            .send()
            .await
            .ok()?;
        let status = resp.json::<serde_json::Value>().await.ok()?;
        (status["sessions"].as_u64() == Some(expected)).then_some(())
    })
    .await
    .unwrap_or_else(|| panic!("timed out waiting for {} active sessions", expected));
}

/// Append to the log the way an external writer would
pub fn append(path: &Path, content: &str) {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .expect("failed to open log for append");
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
}

/// Reads decoded events from an open event-stream response.
pub struct EventStreamReader {
    response: reqwest::Response,
    decoder: SseDecoder,
    ready: VecDeque<SseEvent>,
}

impl EventStreamReader {
    pub async fn connect(client: &Client, url: &str) -> Self {
        let response = client
            .get(url)
            .header("accept", "text/event-stream")
            .send()
            .await
            .expect("failed to open event stream");
        assert!(
            response.status().is_success(),
            "event stream status {:?}",
            response.status()
        );
        Self {
            response,
            decoder: SseDecoder::new(),
            ready: VecDeque::new(),
        }
    }

    pub fn content_type(&self) -> String {
        self.response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    /// Next event, or `None` once the server ends the stream.
    pub async fn next_event(&mut self) -> Option<SseEvent> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Some(event);
            }
            let chunk = tokio::time::timeout(RECV_TIMEOUT, self.response.chunk())
                .await
                .expect("timed out waiting for event")
                .expect("event stream read failed")?;
            self.ready.extend(self.decoder.push(&chunk));
        }
    }
}

async fn poll_until<T, F, Fut>(mut f: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for _ in 0..WAIT_ATTEMPTS {
        if let Some(result) = f().await {
            return Some(result);
        }
        tokio::time::sleep(WAIT_DELAY).await;
    }
    None
}
