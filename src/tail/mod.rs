//! Incremental tail engine: tracks what has been delivered from a growing
//! file, detects appended bytes by polling, frames them into line units and
//! hands them to a transport-specific [`DeliverySink`].

mod engine;
mod error;
mod framer;
mod growth;
mod position;
mod session;
pub mod shutdown;
mod sink;

pub use engine::{
    DisconnectReason, ReadGranularity, SessionReport, StartPosition, TailConfig, TailEngine,
    Termination, DEFAULT_CHUNK_SIZE, DEFAULT_POLL_INTERVAL, MIN_CHUNK_SIZE,
};
pub use error::TailError;
pub use framer::{frame, LineUnit, Terminator};
pub use growth::{Growth, GrowthDetector};
pub use position::PositionTracker;
pub use session::{TailSession, TailState};
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use sink::DeliverySink;
