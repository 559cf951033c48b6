use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::events::TrackerEvent;

/// Error produced by an underlying telemetry write.
///
/// Sinks may fail freely; the tracker absorbs every variant and the caller
/// never sees it.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("telemetry write failed: {0}")]
    WriteFailed(String),
    #[error("telemetry serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Destination for tracker events. Implementations persist events however
/// they like (database row, log pipeline, message bus); the tracker only
/// cares whether the write succeeded.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn record(&self, event: &TrackerEvent) -> Result<(), SinkError>;
}

/// Default sink that emits events as structured log lines.
pub struct TracingSink;

#[async_trait]
impl TelemetrySink for TracingSink {
    async fn record(&self, event: &TrackerEvent) -> Result<(), SinkError> {
        let payload = serde_json::to_string(event)?;
        info!(
            target: "telemetry",
            session_id = event.session_id(),
            event_type = event.event_type(),
            %payload,
            "tracked operation"
        );
        Ok(())
    }
}
