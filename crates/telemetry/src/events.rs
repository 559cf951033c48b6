use serde::{Deserialize, Serialize};

/// Who (or what) caused an analysis run to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    User,
    System,
    Admin,
    RetryQueue,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::User => "user",
            TriggerSource::System => "system",
            TriggerSource::Admin => "admin",
            TriggerSource::RetryQueue => "retry_queue",
        }
    }
}

/// A lifecycle signal emitted while an analysis run progresses.
///
/// Events are ephemeral: they exist only long enough to be handed to a sink.
/// Part numbers are signed on purpose: callers are allowed to hand us
/// garbage and we record it as-is rather than reject it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TrackerEvent {
    AnalysisStart {
        session_id: String,
        tier: String,
        source: TriggerSource,
    },
    PartStart {
        session_id: String,
        part_number: i32,
    },
    PartComplete {
        session_id: String,
        part_number: i32,
        content_len: usize,
        duration_ms: Option<u64>,
    },
    PartFailure {
        session_id: String,
        part_number: i32,
        error: String,
        error_code: String,
    },
    AnalysisComplete {
        session_id: String,
        duration_ms: Option<u64>,
    },
    AnalysisFailure {
        session_id: String,
        error: String,
        failed_part: Option<i32>,
    },
    PartialSuccess {
        session_id: String,
        completed_parts: u32,
        total_parts: u32,
    },
    QueuedForRetry {
        session_id: String,
        reason: String,
    },
}

impl TrackerEvent {
    pub fn session_id(&self) -> &str {
        match self {
            TrackerEvent::AnalysisStart { session_id, .. }
            | TrackerEvent::PartStart { session_id, .. }
            | TrackerEvent::PartComplete { session_id, .. }
            | TrackerEvent::PartFailure { session_id, .. }
            | TrackerEvent::AnalysisComplete { session_id, .. }
            | TrackerEvent::AnalysisFailure { session_id, .. }
            | TrackerEvent::PartialSuccess { session_id, .. }
            | TrackerEvent::QueuedForRetry { session_id, .. } => session_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            TrackerEvent::AnalysisStart { .. } => "analysis_start",
            TrackerEvent::PartStart { .. } => "part_start",
            TrackerEvent::PartComplete { .. } => "part_complete",
            TrackerEvent::PartFailure { .. } => "part_failure",
            TrackerEvent::AnalysisComplete { .. } => "analysis_complete",
            TrackerEvent::AnalysisFailure { .. } => "analysis_failure",
            TrackerEvent::PartialSuccess { .. } => "partial_success",
            TrackerEvent::QueuedForRetry { .. } => "queued_for_retry",
        }
    }

    pub fn part_number(&self) -> Option<i32> {
        match self {
            TrackerEvent::PartStart { part_number, .. }
            | TrackerEvent::PartComplete { part_number, .. }
            | TrackerEvent::PartFailure { part_number, .. } => Some(*part_number),
            TrackerEvent::AnalysisFailure { failed_part, .. } => *failed_part,
            _ => None,
        }
    }

    /// Key used to suppress duplicate recordings of the same logical transition.
    pub(crate) fn idempotency_key(&self) -> String {
        match self.part_number() {
            Some(part) => format!("{}:{}:{}", self.session_id(), self.event_type(), part),
            None => format!("{}:{}", self.session_id(), self.event_type()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotency_key_includes_part_number() {
        let event = TrackerEvent::PartComplete {
            session_id: "s1".into(),
            part_number: 3,
            content_len: 10,
            duration_ms: None,
        };
        assert_eq!(event.idempotency_key(), "s1:part_complete:3");
    }

    #[test]
    fn test_idempotency_key_without_part_number() {
        let event = TrackerEvent::AnalysisComplete {
            session_id: "s1".into(),
            duration_ms: Some(5000),
        };
        assert_eq!(event.idempotency_key(), "s1:analysis_complete");
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = TrackerEvent::AnalysisStart {
            session_id: "s1".into(),
            tier: "full".into(),
            source: TriggerSource::RetryQueue,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "analysis_start");
        assert_eq!(json["data"]["source"], "retry_queue");
    }
}
