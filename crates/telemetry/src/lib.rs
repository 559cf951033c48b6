/*!
# Telemetry

Best-effort lifecycle tracking for analysis runs.

The tracker records start/progress/completion/failure signals without ever
throwing, blocking, or slowing the caller. A circuit breaker shields the
primary flow from a degraded telemetry backend, and a bounded idempotency
cache keeps the same logical transition from being recorded twice.
*/

mod events;
mod sink;
mod tracker;

pub use events::{TrackerEvent, TriggerSource};
pub use sink::{SinkError, TelemetrySink, TracingSink};
pub use tracker::{CircuitBreakerStatus, SafeOperationTracker, TrackOptions, TrackerConfig};
