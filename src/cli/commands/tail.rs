use anyhow::{bail, Context, Result};
use futures::StreamExt;
use std::io::Write;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::cli::sse::SseDecoder;
use crate::cli::{TailArgs, Transport};
use crate::server::{SSE_PATH, WS_PATH};

pub async fn execute_tail(args: TailArgs) -> Result<()> {
    let base_url = args.url.trim_end_matches('/');

    match args.transport {
        Transport::Ws => tail_websocket(&format!("{}{}", websocket_url(base_url), WS_PATH)).await,
        Transport::Sse => tail_event_stream(&format!("{}{}", base_url, SSE_PATH)).await,
    }
}

/// Convert https:// to wss:// or http:// to ws://
pub fn websocket_url(base_url: &str) -> String {
    if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if base_url.starts_with("ws://") || base_url.starts_with("wss://") {
        base_url.to_string()
    } else {
        format!("ws://{}", base_url)
    }
}

async fn tail_websocket(url: &str) -> Result<()> {
    eprintln!("Connecting to {}...", url);

    let (ws_stream, _) = connect_async(url)
        .await
        .with_context(|| format!("Failed to connect to {}", url))?;
    let (_, mut read) = ws_stream.split();

    eprintln!("Connected. Press Ctrl+C to stop.\n");

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => emit(&text)?,
            Ok(Message::Close(_)) => {
                eprintln!("Connection closed by server");
                break;
            }
            Err(e) => {
                eprintln!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    Ok(())
}

async fn tail_event_stream(url: &str) -> Result<()> {
    eprintln!("Connecting to {}...", url);

    let mut response = reqwest::Client::new()
        .get(url)
        .header("accept", "text/event-stream")
        .send()
        .await
        .with_context(|| format!("Failed to connect to {}", url))?;
    if !response.status().is_success() {
        bail!("Server returned {}", response.status());
    }

    eprintln!("Connected. Press Ctrl+C to stop.\n");

    let mut decoder = SseDecoder::new();
    while let Some(chunk) = response.chunk().await? {
        for event in decoder.push(&chunk) {
            if event.event == "message" {
                emit(&event.data)?;
            }
        }
    }

    eprintln!("Stream ended by server");
    Ok(())
}

/// Lines arrive with their own terminators; print them verbatim.
fn emit(text: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
