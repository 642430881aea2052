pub mod commands;
pub mod config;
pub mod sse;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::server::LogFormat;
use crate::tail::{ReadGranularity, StartPosition};

#[derive(Parser)]
#[command(name = "logstream")]
#[command(about = "Stream the tail of a log file over WebSocket and Server-Sent Events")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the log file to remote observers
    Serve(ServeArgs),
    /// Connect to a running server and print the stream
    Tail(TailArgs),
}

#[derive(clap::Args, Debug, Default)]
pub struct ServeArgs {
    /// Path to a TOML config file (defaults to ./logstream.toml when present)
    #[arg(long, env = "LOGSTREAM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen address
    #[arg(long, env = "LOGSTREAM_HOST")]
    pub host: Option<String>,

    /// Listen port
    #[arg(long, env = "LOGSTREAM_PORT")]
    pub port: Option<u16>,

    /// Log file to stream (overrides --root)
    #[arg(long, env = "LOGSTREAM_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Base directory holding api_logs/app.log
    #[arg(long, env = "LOGSTREAM_ROOT")]
    pub root: Option<PathBuf>,

    /// Use the nearest ancestor directory with this name as the base directory
    #[arg(long, env = "LOGSTREAM_ROOT_MARKER")]
    pub root_marker: Option<String>,

    /// Delay between growth polls, in milliseconds
    #[arg(long, env = "LOGSTREAM_POLL_INTERVAL_MS")]
    pub poll_interval_ms: Option<u64>,

    /// Maximum bytes read per poll
    #[arg(long, env = "LOGSTREAM_CHUNK_SIZE")]
    pub chunk_size: Option<usize>,

    /// Where new sessions start: beginning or end
    #[arg(long, env = "LOGSTREAM_START")]
    pub start: Option<StartPosition>,

    /// Read granularity for WebSocket sessions: lines or chunked
    #[arg(long, env = "LOGSTREAM_PUSH_GRANULARITY")]
    pub push_granularity: Option<ReadGranularity>,

    /// Read granularity for event-stream sessions: lines or chunked
    #[arg(long, env = "LOGSTREAM_PULL_GRANULARITY")]
    pub pull_granularity: Option<ReadGranularity>,

    /// Public path prefix when served behind a proxy (e.g. /log-stream)
    #[arg(long, env = "LOGSTREAM_BASE_PATH")]
    pub base_path: Option<String>,

    /// Seconds between SSE keep-alive comments
    #[arg(long, env = "LOGSTREAM_KEEP_ALIVE_SECS")]
    pub keep_alive_secs: Option<u64>,

    /// Log output format
    #[arg(long, value_enum, env = "LOGSTREAM_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// WebSocket push stream
    Ws,
    /// Server-Sent Events stream
    Sse,
}

#[derive(clap::Args, Debug)]
pub struct TailArgs {
    /// Server URL
    #[arg(long, default_value = "http://127.0.0.1:9000", env = "LOGSTREAM_URL")]
    pub url: String,

    /// Transport to stream over
    #[arg(long, value_enum, default_value = "ws")]
    pub transport: Transport,
}
