use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::cli::config::{self, Config};
use crate::cli::ServeArgs;
use crate::server::{build_router, init_tracing};
use crate::tail::shutdown;

pub async fn execute_serve(args: ServeArgs) -> Result<()> {
    let file = Config::load(args.config.as_deref())?;
    let cwd = std::env::current_dir().context("Failed to read working directory")?;
    let resolved = config::resolve(args, file, &cwd)?;

    init_tracing(resolved.log_format);

    let log_path = resolved.server.log_path.clone();
    if !log_path.exists() {
        // Not fatal: each session reports the missing file to its client.
        warn!(path = %log_path.display(), "log file does not exist yet");
    }

    let addr = resolved.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(
        addr = %addr,
        log_file = %log_path.display(),
        poll_interval_ms = resolved.server.pull.poll_interval.as_millis() as u64,
        "log stream server listening"
    );

    let (trigger, shutdown) = shutdown::channel();
    let app = build_router(resolved.server, shutdown);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            info!("shutting down, closing active sessions");
            trigger.fire();
        })
        .await
        .context("Server error")?;

    Ok(())
}
