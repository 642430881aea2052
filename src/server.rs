use axum::{
    extract::State,
    response::{Html, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::tail::{ReadGranularity, Shutdown, TailConfig};
use crate::transport::{sse_log_stream, ws_log_stream};
use crate::viewer;

pub const WS_PATH: &str = "/ws-log-stream";
pub const SSE_PATH: &str = "/http-log-stream";
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Initialize the tracing subscriber.
/// Uses RUST_LOG env var for filtering (defaults to info).
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true))
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
    }
}

/// Everything the router needs to serve one log file.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub log_path: PathBuf,
    /// Engine settings for WebSocket sessions.
    pub push: TailConfig,
    /// Engine settings for event-stream sessions.
    pub pull: TailConfig,
    /// Interval between SSE keep-alive comments.
    pub keep_alive: Duration,
    /// Public path prefix the viewer page uses when behind a proxy (e.g. `/log-stream`).
    pub base_path: String,
}

impl ServerSettings {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
            push: TailConfig::default().with_granularity(ReadGranularity::Lines),
            pull: TailConfig::default(),
            keep_alive: DEFAULT_KEEP_ALIVE,
            base_path: String::new(),
        }
    }
}

/// Shared, read-mostly state handed to every handler.
pub struct AppState {
    settings: ServerSettings,
    page: String,
    shutdown: Shutdown,
    active: AtomicUsize,
    next_id: AtomicU64,
}

impl AppState {
    pub fn new(settings: ServerSettings, shutdown: Shutdown) -> Self {
        let page = viewer::render(&settings.log_path, &settings.base_path);
        Self {
            settings,
            page,
            shutdown,
            active: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.settings.log_path
    }

    pub fn push_config(&self) -> &TailConfig {
        &self.settings.push
    }

    pub fn pull_config(&self) -> &TailConfig {
        &self.settings.pull
    }

    pub fn keep_alive(&self) -> Duration {
        self.settings.keep_alive
    }

    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn begin_session(&self) -> SessionGuard<'_> {
        self.active.fetch_add(1, Ordering::SeqCst);
        SessionGuard {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            active: &self.active,
        }
    }
}

/// Counts a session as active until dropped, on every exit path.
pub(crate) struct SessionGuard<'a> {
    id: u64,
    active: &'a AtomicUsize,
}

impl SessionGuard<'_> {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn build_router(settings: ServerSettings, shutdown: Shutdown) -> Router {
    build_router_with_state(Arc::new(AppState::new(settings, shutdown)))
}

pub fn build_router_with_state(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(viewer_page))
        .route(WS_PATH, get(ws_log_stream))
        .route(SSE_PATH, get(sse_log_stream))
        .route("/status", get(status))
        .route("/health", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn viewer_page(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(state.page.clone())
}

async fn status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "sessions": state.active_sessions(),
        "log_file": state.log_path().display().to_string(),
    }))
}
