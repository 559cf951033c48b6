use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::events::{TrackerEvent, TriggerSource};
use crate::sink::{TelemetrySink, TracingSink};

/// Tuning knobs for the tracker's protections.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Consecutive sink failures before the breaker opens.
    pub failure_threshold: u32,
    /// How long the breaker stays open before writes are attempted again.
    pub cooldown: Duration,
    /// Upper bound on remembered idempotency keys.
    pub max_cache_entries: usize,
    /// Whether writes are dispatched without awaiting by default.
    pub async_dispatch: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
            max_cache_entries: 200,
            async_dispatch: true,
        }
    }
}

/// Per-call overrides for a tracking operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackOptions {
    /// Emit extra diagnostic output for this call.
    pub debug: bool,
    /// Override the configured dispatch mode. `Some(false)` awaits the sink
    /// write internally; failures still never propagate out.
    pub async_dispatch: Option<bool>,
}

/// Snapshot of the circuit breaker, for diagnostics and tests.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerStatus {
    pub is_open: bool,
    pub failures: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
}

struct BreakerState {
    failures: u32,
    opened_at: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            failures: 0,
            opened_at: None,
            last_failure_at: None,
        }
    }
}

/// FIFO set of already-recorded event keys. Oldest entries are evicted once
/// the bound is reached so long-running processes do not leak.
struct IdempotencyCache {
    seen: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl IdempotencyCache {
    fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    /// Returns false when the key was already present.
    fn insert(&mut self, key: String) -> bool {
        if self.seen.contains(&key) {
            return false;
        }
        while self.order.len() >= self.capacity.max(1) {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        self.order.push_back(key.clone());
        self.seen.insert(key);
        true
    }

    fn len(&self) -> usize {
        self.seen.len()
    }

    fn clear(&mut self) {
        self.seen.clear();
        self.order.clear();
    }
}

struct Shared {
    sink: Arc<dyn TelemetrySink>,
    config: TrackerConfig,
    breaker: Mutex<BreakerState>,
    cache: Mutex<IdempotencyCache>,
}

impl Shared {
    // A poisoned lock means a panic elsewhere; telemetry state is still
    // usable, so recover the guard instead of propagating the panic.
    fn breaker_guard(&self) -> MutexGuard<'_, BreakerState> {
        self.breaker.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn cache_guard(&self) -> MutexGuard<'_, IdempotencyCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Checks the breaker, resetting it if the cooldown has elapsed.
    fn breaker_open(&self) -> bool {
        let mut state = self.breaker_guard();
        match state.opened_at {
            Some(opened) if opened.elapsed() >= self.config.cooldown => {
                state.opened_at = None;
                state.failures = 0;
                debug!("telemetry circuit breaker cooldown elapsed, closing");
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    fn record_failure(&self) {
        let mut state = self.breaker_guard();
        state.failures = state.failures.saturating_add(1);
        state.last_failure_at = Some(Utc::now());
        if state.failures >= self.config.failure_threshold && state.opened_at.is_none() {
            state.opened_at = Some(Instant::now());
            warn!(
                failures = state.failures,
                "telemetry circuit breaker opened, skipping writes until cooldown or reset"
            );
        }
    }

    fn record_success(&self) {
        let mut state = self.breaker_guard();
        state.failures = 0;
        state.opened_at = None;
    }

    async fn write(self: Arc<Self>, event: TrackerEvent) {
        match self.sink.record(&event).await {
            Ok(()) => self.record_success(),
            Err(err) => {
                warn!(
                    session_id = event.session_id(),
                    event_type = event.event_type(),
                    error = %err,
                    "telemetry write failed (absorbed)"
                );
                self.record_failure();
            }
        }
    }
}

/// Best-effort lifecycle recorder for analysis runs.
///
/// Every `track_*` operation returns control immediately, never panics and
/// never reports an error. A degraded sink only shows up in
/// [`circuit_breaker_status`](SafeOperationTracker::circuit_breaker_status);
/// the primary analysis flow is never slowed or failed by telemetry.
///
/// The handle is cheap to clone; all clones share the breaker and the
/// idempotency cache.
#[derive(Clone)]
pub struct SafeOperationTracker {
    shared: Arc<Shared>,
}

impl SafeOperationTracker {
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self::with_config(sink, TrackerConfig::default())
    }

    pub fn with_config(sink: Arc<dyn TelemetrySink>, config: TrackerConfig) -> Self {
        let capacity = config.max_cache_entries;
        Self {
            shared: Arc::new(Shared {
                sink,
                config,
                breaker: Mutex::new(BreakerState::new()),
                cache: Mutex::new(IdempotencyCache::new(capacity)),
            }),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.shared.config
    }

    pub async fn track_analysis_start(
        &self,
        session_id: &str,
        tier: &str,
        source: TriggerSource,
        opts: TrackOptions,
    ) {
        self.dispatch(
            TrackerEvent::AnalysisStart {
                session_id: session_id.to_string(),
                tier: tier.to_string(),
                source,
            },
            opts,
        )
        .await;
    }

    pub async fn track_part_start(&self, session_id: &str, part_number: i32, opts: TrackOptions) {
        self.dispatch(
            TrackerEvent::PartStart {
                session_id: session_id.to_string(),
                part_number,
            },
            opts,
        )
        .await;
    }

    pub async fn track_part_complete(
        &self,
        session_id: &str,
        part_number: i32,
        content: &str,
        duration_ms: Option<u64>,
        opts: TrackOptions,
    ) {
        self.dispatch(
            TrackerEvent::PartComplete {
                session_id: session_id.to_string(),
                part_number,
                content_len: content.len(),
                duration_ms,
            },
            opts,
        )
        .await;
    }

    pub async fn track_part_failure(
        &self,
        session_id: &str,
        part_number: i32,
        error: &str,
        error_code: &str,
        opts: TrackOptions,
    ) {
        self.dispatch(
            TrackerEvent::PartFailure {
                session_id: session_id.to_string(),
                part_number,
                error: error.to_string(),
                error_code: error_code.to_string(),
            },
            opts,
        )
        .await;
    }

    pub async fn track_analysis_complete(
        &self,
        session_id: &str,
        duration_ms: Option<u64>,
        opts: TrackOptions,
    ) {
        self.dispatch(
            TrackerEvent::AnalysisComplete {
                session_id: session_id.to_string(),
                duration_ms,
            },
            opts,
        )
        .await;
    }

    pub async fn track_analysis_failure(
        &self,
        session_id: &str,
        error: &str,
        failed_part: Option<i32>,
        opts: TrackOptions,
    ) {
        self.dispatch(
            TrackerEvent::AnalysisFailure {
                session_id: session_id.to_string(),
                error: error.to_string(),
                failed_part,
            },
            opts,
        )
        .await;
    }

    pub async fn track_partial_success(
        &self,
        session_id: &str,
        completed_parts: u32,
        total_parts: u32,
        opts: TrackOptions,
    ) {
        self.dispatch(
            TrackerEvent::PartialSuccess {
                session_id: session_id.to_string(),
                completed_parts,
                total_parts,
            },
            opts,
        )
        .await;
    }

    pub async fn track_queued_for_retry(&self, session_id: &str, reason: &str, opts: TrackOptions) {
        self.dispatch(
            TrackerEvent::QueuedForRetry {
                session_id: session_id.to_string(),
                reason: reason.to_string(),
            },
            opts,
        )
        .await;
    }

    pub fn circuit_breaker_status(&self) -> CircuitBreakerStatus {
        let state = self.shared.breaker_guard();
        let is_open = match state.opened_at {
            Some(opened) => opened.elapsed() < self.shared.config.cooldown,
            None => false,
        };
        CircuitBreakerStatus {
            is_open,
            failures: state.failures,
            last_failure_at: state.last_failure_at,
        }
    }

    pub fn reset_circuit_breaker(&self) {
        let mut state = self.shared.breaker_guard();
        *state = BreakerState::new();
    }

    pub fn idempotency_cache_size(&self) -> usize {
        self.shared.cache_guard().len()
    }

    pub fn clear_idempotency_cache(&self) {
        self.shared.cache_guard().clear();
    }

    async fn dispatch(&self, event: TrackerEvent, opts: TrackOptions) {
        if opts.debug {
            debug!(
                session_id = event.session_id(),
                event_type = event.event_type(),
                part_number = ?event.part_number(),
                "tracking operation"
            );
        }

        let is_new = self.shared.cache_guard().insert(event.idempotency_key());
        if !is_new {
            debug!(
                session_id = event.session_id(),
                event_type = event.event_type(),
                "duplicate tracking call suppressed"
            );
            return;
        }

        if self.shared.breaker_open() {
            debug!(
                session_id = event.session_id(),
                event_type = event.event_type(),
                "circuit breaker open, skipping telemetry write"
            );
            return;
        }

        let shared = Arc::clone(&self.shared);
        if opts
            .async_dispatch
            .unwrap_or(self.shared.config.async_dispatch)
        {
            tokio::spawn(shared.write(event));
        } else {
            shared.write(event).await;
        }
    }
}

impl Default for SafeOperationTracker {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}
