use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::ServeArgs;
use crate::server::{LogFormat, ServerSettings, DEFAULT_KEEP_ALIVE};
use crate::tail::{
    ReadGranularity, StartPosition, TailConfig, DEFAULT_CHUNK_SIZE, MIN_CHUNK_SIZE,
};

pub const CONFIG_FILENAME: &str = "logstream.toml";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9000;
pub const LOG_DIR: &str = "api_logs";
pub const LOG_FILE: &str = "app.log";

/// Settings read from `logstream.toml`. Every field is optional; CLI flags and
/// environment variables take precedence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub log_file: Option<PathBuf>,
    pub root: Option<PathBuf>,
    pub root_marker: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub chunk_size: Option<usize>,
    pub start: Option<StartPosition>,
    pub push_granularity: Option<ReadGranularity>,
    pub pull_granularity: Option<ReadGranularity>,
    pub base_path: Option<String>,
    pub keep_alive_secs: Option<u64>,
    pub log_format: Option<LogFormat>,
}

impl Config {
    /// Load `explicit` if given (it must exist), else `./logstream.toml` if
    /// present, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => load_config_from_path(path),
            None if Path::new(CONFIG_FILENAME).exists() => load_config_from_path(CONFIG_FILENAME),
            None => Ok(Self::default()),
        }
    }
}

pub fn load_config_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.as_ref().display()))?;
    Ok(config)
}

/// Fully resolved `serve` settings.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
    pub server: ServerSettings,
}

impl ServeConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Merge CLI arguments over the file config over built-in defaults.
pub fn resolve(args: ServeArgs, file: Config, cwd: &Path) -> Result<ServeConfig> {
    let log_path = resolve_log_path(
        args.log_file.or(file.log_file).as_deref(),
        args.root.or(file.root).as_deref(),
        args.root_marker.or(file.root_marker).as_deref(),
        cwd,
    );

    let poll_interval_ms = args.poll_interval_ms.or(file.poll_interval_ms);
    if poll_interval_ms == Some(0) {
        bail!("poll interval must be greater than zero");
    }
    let chunk_size = args
        .chunk_size
        .or(file.chunk_size)
        .unwrap_or(DEFAULT_CHUNK_SIZE);
    if chunk_size < MIN_CHUNK_SIZE {
        bail!("chunk size must be at least {} bytes", MIN_CHUNK_SIZE);
    }
    let keep_alive_secs = args.keep_alive_secs.or(file.keep_alive_secs);
    if keep_alive_secs == Some(0) {
        bail!("keep-alive interval must be greater than zero");
    }

    let base = TailConfig {
        poll_interval: poll_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(TailConfig::default().poll_interval),
        chunk_size,
        start: args.start.or(file.start).unwrap_or_default(),
        granularity: ReadGranularity::Chunked,
    };

    let server = ServerSettings {
        log_path,
        push: base.clone().with_granularity(
            args.push_granularity
                .or(file.push_granularity)
                .unwrap_or(ReadGranularity::Lines),
        ),
        pull: base.with_granularity(
            args.pull_granularity
                .or(file.pull_granularity)
                .unwrap_or(ReadGranularity::Chunked),
        ),
        keep_alive: keep_alive_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_KEEP_ALIVE),
        base_path: normalize_base_path(args.base_path.or(file.base_path).as_deref()),
    };

    Ok(ServeConfig {
        host: args
            .host
            .or(file.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: args.port.or(file.port).unwrap_or(DEFAULT_PORT),
        log_format: args.log_format.or(file.log_format).unwrap_or_default(),
        server,
    })
}

/// Locate the log file: an explicit path wins, otherwise `<root>/api_logs/app.log`.
///
/// The root is `root` if given, else the nearest ancestor of `cwd` named
/// `root_marker`, else `cwd`.
pub fn resolve_log_path(
    log_file: Option<&Path>,
    root: Option<&Path>,
    root_marker: Option<&str>,
    cwd: &Path,
) -> PathBuf {
    if let Some(path) = log_file {
        return path.to_path_buf();
    }

    let root = root
        .map(Path::to_path_buf)
        .or_else(|| root_marker.and_then(|name| find_ancestor_named(cwd, name)))
        .unwrap_or_else(|| cwd.to_path_buf());

    root.join(LOG_DIR).join(LOG_FILE)
}

/// Nearest ancestor of `start` (inclusive) whose final component is `name`.
pub fn find_ancestor_named(start: &Path, name: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.file_name().is_some_and(|n| n == name))
        .map(Path::to_path_buf)
}

fn normalize_base_path(base_path: Option<&str>) -> String {
    match base_path.map(|p| p.trim().trim_matches('/')) {
        Some(p) if !p.is_empty() => format!("/{}", p),
        _ => String::new(),
    }
}
