//! SafeOperationTracker integration tests.
//!
//! These verify that tracking never blocks the caller, that sink failures
//! stay contained, that the circuit breaker opens and resets, and that the
//! idempotency cache suppresses duplicates while staying bounded.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::{
    SafeOperationTracker, SinkError, TelemetrySink, TrackOptions, TrackerConfig, TrackerEvent,
    TriggerSource,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Counts successful writes.
struct CountingSink {
    writes: AtomicUsize,
}

impl CountingSink {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            writes: AtomicUsize::new(0),
        })
    }

    fn count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelemetrySink for CountingSink {
    async fn record(&self, _event: &TrackerEvent) -> Result<(), SinkError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Fails every write.
struct FailingSink;

#[async_trait]
impl TelemetrySink for FailingSink {
    async fn record(&self, _event: &TrackerEvent) -> Result<(), SinkError> {
        Err(SinkError::WriteFailed("backend unavailable".into()))
    }
}

/// Takes far longer than the caller is allowed to wait.
struct SlowSink;

#[async_trait]
impl TelemetrySink for SlowSink {
    async fn record(&self, _event: &TrackerEvent) -> Result<(), SinkError> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(())
    }
}

fn sync_opts() -> TrackOptions {
    TrackOptions {
        debug: false,
        async_dispatch: Some(false),
    }
}

#[tokio::test]
async fn returns_immediately_with_slow_sink() {
    let tracker = SafeOperationTracker::new(Arc::new(SlowSink));
    let started = Instant::now();

    tracker
        .track_analysis_start("timing-session", "standard", TriggerSource::User, TrackOptions::default())
        .await;
    tracker
        .track_part_start("timing-session", 1, TrackOptions::default())
        .await;
    tracker
        .track_part_complete("timing-session", 1, "content", Some(1000), TrackOptions::default())
        .await;
    tracker
        .track_analysis_complete("timing-session", Some(5000), TrackOptions::default())
        .await;

    assert!(
        started.elapsed() < Duration::from_millis(50),
        "fire-and-forget calls must not wait on the sink"
    );
}

#[tokio::test]
async fn absorbs_sink_failures() {
    init_tracing();
    let tracker = SafeOperationTracker::new(Arc::new(FailingSink));

    // None of these may panic or surface an error, even with junk arguments.
    tracker
        .track_analysis_start("", "standard", TriggerSource::User, sync_opts())
        .await;
    tracker
        .track_part_complete("invalid", -1, "", None, sync_opts())
        .await;
    tracker
        .track_analysis_failure("test", "boom", Some(999), sync_opts())
        .await;
}

#[tokio::test]
async fn handles_edge_case_arguments() {
    let sink = CountingSink::new();
    let tracker = SafeOperationTracker::new(sink.clone());

    let long_content = "x".repeat(100_000);
    tracker
        .track_part_complete("session-123", 1, &long_content, Some(1000), sync_opts())
        .await;
    tracker
        .track_part_complete(
            "session-123",
            2,
            "émojis 🚀 and <html> tags & \"quotes\"",
            Some(0),
            sync_opts(),
        )
        .await;
    tracker
        .track_part_start("session-123", -1, sync_opts())
        .await;
    tracker
        .track_part_failure("session-123", 1, "", "EMPTY", sync_opts())
        .await;
    tracker
        .track_analysis_complete("session-456", None, sync_opts())
        .await;

    assert_eq!(sink.count(), 5);
}

#[tokio::test]
async fn suppresses_duplicate_events() {
    let sink = CountingSink::new();
    let tracker = SafeOperationTracker::new(sink.clone());

    tracker
        .track_analysis_start("dup-session", "standard", TriggerSource::User, sync_opts())
        .await;
    tracker
        .track_analysis_start("dup-session", "standard", TriggerSource::User, sync_opts())
        .await;

    assert_eq!(sink.count(), 1, "same logical event must record once");
    assert_eq!(tracker.idempotency_cache_size(), 1);
}

#[tokio::test]
async fn distinct_parts_are_not_deduplicated() {
    let sink = CountingSink::new();
    let tracker = SafeOperationTracker::new(sink.clone());

    for part in 1..=4 {
        tracker
            .track_part_complete("multi-session", part, "content", Some(1000), sync_opts())
            .await;
    }

    assert_eq!(sink.count(), 4);
}

#[tokio::test]
async fn circuit_breaker_starts_closed() {
    let tracker = SafeOperationTracker::new(CountingSink::new());
    let status = tracker.circuit_breaker_status();
    assert!(!status.is_open);
    assert_eq!(status.failures, 0);
    assert!(status.last_failure_at.is_none());
}

#[tokio::test]
async fn circuit_breaker_opens_after_threshold_failures() {
    let config = TrackerConfig {
        failure_threshold: 3,
        ..TrackerConfig::default()
    };
    let tracker = SafeOperationTracker::with_config(Arc::new(FailingSink), config);

    for part in 1..=3 {
        tracker
            .track_part_start("breaker-session", part, sync_opts())
            .await;
    }

    let status = tracker.circuit_breaker_status();
    assert!(status.is_open);
    assert_eq!(status.failures, 3);
    assert!(status.last_failure_at.is_some());

    // Open breaker short-circuits: the failure count no longer grows.
    tracker
        .track_part_start("breaker-session", 4, sync_opts())
        .await;
    assert_eq!(tracker.circuit_breaker_status().failures, 3);
}

#[tokio::test]
async fn circuit_breaker_resets_manually() {
    let config = TrackerConfig {
        failure_threshold: 2,
        ..TrackerConfig::default()
    };
    let tracker = SafeOperationTracker::with_config(Arc::new(FailingSink), config);

    tracker
        .track_part_start("reset-session", 1, sync_opts())
        .await;
    tracker
        .track_part_start("reset-session", 2, sync_opts())
        .await;
    assert!(tracker.circuit_breaker_status().is_open);

    tracker.reset_circuit_breaker();
    let status = tracker.circuit_breaker_status();
    assert!(!status.is_open);
    assert_eq!(status.failures, 0);
    assert!(status.last_failure_at.is_none());
}

#[tokio::test]
async fn circuit_breaker_closes_after_cooldown_expiry() {
    // Fails twice to open the breaker, then succeeds once writes resume.
    struct RecoveringSink {
        remaining_failures: AtomicUsize,
        successes: AtomicUsize,
    }

    #[async_trait]
    impl TelemetrySink for RecoveringSink {
        async fn record(&self, _event: &TrackerEvent) -> Result<(), SinkError> {
            if self.remaining_failures.load(Ordering::SeqCst) > 0 {
                self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
                return Err(SinkError::WriteFailed("backend restarting".into()));
            }
            self.successes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let sink = Arc::new(RecoveringSink {
        remaining_failures: AtomicUsize::new(2),
        successes: AtomicUsize::new(0),
    });
    let config = TrackerConfig {
        failure_threshold: 2,
        cooldown: Duration::from_millis(100),
        ..TrackerConfig::default()
    };
    let tracker = SafeOperationTracker::with_config(sink.clone(), config);

    tracker
        .track_part_start("cooldown-session", 1, sync_opts())
        .await;
    tracker
        .track_part_start("cooldown-session", 2, sync_opts())
        .await;
    assert!(tracker.circuit_breaker_status().is_open);

    // While open, writes are skipped entirely.
    tracker
        .track_part_start("cooldown-session", 3, sync_opts())
        .await;
    assert_eq!(sink.successes.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!tracker.circuit_breaker_status().is_open);

    // First write after the cooldown reaches the sink again.
    tracker
        .track_part_start("cooldown-session", 4, sync_opts())
        .await;
    let status = tracker.circuit_breaker_status();
    assert!(!status.is_open);
    assert_eq!(status.failures, 0);
    assert_eq!(sink.successes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn breaker_closes_after_successful_write() {
    // Fails twice, then succeeds.
    struct FlakySink {
        remaining_failures: AtomicUsize,
    }

    #[async_trait]
    impl TelemetrySink for FlakySink {
        async fn record(&self, _event: &TrackerEvent) -> Result<(), SinkError> {
            if self.remaining_failures.load(Ordering::SeqCst) > 0 {
                self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
                return Err(SinkError::WriteFailed("flaky".into()));
            }
            Ok(())
        }
    }

    let tracker = SafeOperationTracker::new(Arc::new(FlakySink {
        remaining_failures: AtomicUsize::new(2),
    }));

    tracker
        .track_part_start("flaky-session", 1, sync_opts())
        .await;
    tracker
        .track_part_start("flaky-session", 2, sync_opts())
        .await;
    assert_eq!(tracker.circuit_breaker_status().failures, 2);

    tracker
        .track_part_start("flaky-session", 3, sync_opts())
        .await;
    assert_eq!(tracker.circuit_breaker_status().failures, 0);
}

#[tokio::test]
async fn idempotency_cache_stays_bounded() {
    let sink = CountingSink::new();
    let tracker = SafeOperationTracker::new(sink.clone());

    for i in 0..200 {
        let session = format!("memory-test-{i}");
        tracker
            .track_analysis_start(&session, "standard", TriggerSource::User, sync_opts())
            .await;
        tracker
            .track_analysis_complete(&session, Some(1000), sync_opts())
            .await;
    }

    assert!(tracker.idempotency_cache_size() <= 200);
}

#[tokio::test]
async fn clear_cache_allows_re_recording() {
    let sink = CountingSink::new();
    let tracker = SafeOperationTracker::new(sink.clone());

    tracker
        .track_analysis_start("cache-1", "standard", TriggerSource::User, sync_opts())
        .await;
    tracker
        .track_analysis_start("cache-2", "medium", TriggerSource::User, sync_opts())
        .await;
    assert_eq!(tracker.idempotency_cache_size(), 2);

    tracker.clear_idempotency_cache();
    assert_eq!(tracker.idempotency_cache_size(), 0);

    tracker
        .track_analysis_start("cache-1", "standard", TriggerSource::User, sync_opts())
        .await;
    assert_eq!(sink.count(), 3);
}

#[tokio::test]
async fn all_trigger_sources_record() {
    let sink = CountingSink::new();
    let tracker = SafeOperationTracker::new(sink.clone());

    for (i, source) in [
        TriggerSource::User,
        TriggerSource::System,
        TriggerSource::Admin,
        TriggerSource::RetryQueue,
    ]
    .into_iter()
    .enumerate()
    {
        tracker
            .track_analysis_start(&format!("source-{i}"), "standard", source, sync_opts())
            .await;
    }

    assert_eq!(sink.count(), 4);
}

#[tokio::test]
async fn full_tier_lifecycle_records_each_transition_once() {
    let sink = CountingSink::new();
    let tracker = SafeOperationTracker::new(sink.clone());
    let session = "syndicate-flow";

    tracker
        .track_analysis_start(session, "full", TriggerSource::User, sync_opts())
        .await;
    for part in 1..=4 {
        tracker.track_part_start(session, part, sync_opts()).await;
        tracker
            .track_part_complete(session, part, "content", Some(part as u64 * 1000), sync_opts())
            .await;
    }
    tracker
        .track_analysis_complete(session, Some(10_000), sync_opts())
        .await;

    // start + 4x(start, complete) + complete
    assert_eq!(sink.count(), 10);
}

#[tokio::test]
async fn degraded_run_records_partial_success_and_retry() {
    let sink = CountingSink::new();
    let tracker = SafeOperationTracker::new(sink.clone());
    let session = "degraded-flow";

    tracker
        .track_analysis_start(session, "full", TriggerSource::User, sync_opts())
        .await;
    for part in 1..=2 {
        tracker.track_part_start(session, part, sync_opts()).await;
        tracker
            .track_part_complete(session, part, "content", None, sync_opts())
            .await;
    }
    tracker.track_part_start(session, 3, sync_opts()).await;
    tracker
        .track_part_failure(session, 3, "API timeout", "TIMEOUT", sync_opts())
        .await;
    tracker
        .track_partial_success(session, 2, 4, sync_opts())
        .await;
    tracker
        .track_queued_for_retry(session, "gateway timeout", sync_opts())
        .await;

    assert_eq!(sink.count(), 9);
}

#[tokio::test]
async fn concurrent_sessions_do_not_interfere() {
    let sink = CountingSink::new();
    let tracker = SafeOperationTracker::new(sink.clone());

    let mut handles = Vec::new();
    for i in 0..10 {
        let tracker = tracker.clone();
        handles.push(tokio::spawn(async move {
            let session = format!("concurrent-{i}");
            tracker
                .track_analysis_start(&session, "standard", TriggerSource::User, sync_opts())
                .await;
            tracker
                .track_part_complete(&session, 1, "content", Some(1000), sync_opts())
                .await;
            tracker
                .track_analysis_complete(&session, Some(1000), sync_opts())
                .await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(sink.count(), 30);
    assert_eq!(tracker.idempotency_cache_size(), 30);
}

#[tokio::test]
async fn debug_option_does_not_change_behavior() {
    let sink = CountingSink::new();
    let tracker = SafeOperationTracker::new(sink.clone());
    let opts = TrackOptions {
        debug: true,
        async_dispatch: Some(false),
    };

    tracker
        .track_analysis_start("debug-session", "standard", TriggerSource::User, opts)
        .await;
    tracker
        .track_part_complete("debug-session", 1, "content", Some(1000), opts)
        .await;

    assert_eq!(sink.count(), 2);
}
