use super::framer::LineUnit;

/// Transport-specific half of a tail session.
///
/// The engine is written once against this trait; each transport supplies only
/// how a unit is sent and how peer closure is detected.
#[async_trait::async_trait]
pub trait DeliverySink: Send {
    /// Short transport name used in logs.
    fn transport(&self) -> &'static str;

    /// Send one unit. Returns `false` once the peer is gone.
    async fn deliver(&mut self, unit: &LineUnit) -> bool;

    /// Non-blocking liveness check, consulted before each delivery and after
    /// each idle wait.
    fn is_connected(&self) -> bool;
}
