//! Streams the tail of a continuously appended log file to remote observers
//! over a WebSocket push channel and a Server-Sent Events stream.

pub mod cli;
pub mod server;
pub mod tail;
pub mod transport;
mod viewer;

pub use server::{build_router, init_tracing, AppState, ServerSettings};
pub use tail::{LineUnit, TailConfig, TailEngine};
