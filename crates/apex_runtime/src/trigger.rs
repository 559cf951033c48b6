//! Entry point that turns a paid session into a running analysis.
//!
//! Callers (payment webhook, admin retry, queue drain) funnel through
//! [`AnalysisService::start_analysis`], which owns session status transitions.
//! The engine never touches session status itself; it only writes result
//! rows.

use std::sync::Arc;
use tracing::{error, info};

use telemetry::{SafeOperationTracker, TrackOptions, TriggerSource};

use crate::engines::llm::GatewayClient;
use crate::engines::orchestrator::{AnalysisEngine, AnalysisObserver, NoopObserver};
use crate::errors::{ApexError, ApexResult, ErrorCategory, ErrorCode, ErrorSeverity};
use crate::persistence::SessionStore;
use crate::types::{AnalysisResult, SessionStatus};

/// Problem statements shorter than this carry too little signal to analyze.
pub const MIN_PROBLEM_LEN: usize = 10;
/// Upper bound keeps a single statement inside one prompt comfortably.
pub const MAX_PROBLEM_LEN: usize = 5_000;

/// Coordinates session lookup, validation, status transitions, and the
/// engine run for one trigger.
pub struct AnalysisService {
    store: Arc<dyn SessionStore>,
    engine: AnalysisEngine,
    tracker: SafeOperationTracker,
}

impl AnalysisService {
    pub fn new(
        gateway: Arc<dyn GatewayClient>,
        store: Arc<dyn SessionStore>,
        tracker: SafeOperationTracker,
    ) -> Self {
        let engine = AnalysisEngine::new(gateway, Arc::clone(&store), tracker.clone());
        Self {
            store,
            engine,
            tracker,
        }
    }

    /// Runs the full analysis for a session, leaving it `completed` or
    /// `failed`. Validation failures never flip the session to `processing`.
    pub async fn start_analysis(
        &self,
        session_id: &str,
        source: TriggerSource,
    ) -> ApexResult<AnalysisResult> {
        self.start_analysis_observed(session_id, source, &NoopObserver)
            .await
    }

    /// Same as [`start_analysis`](Self::start_analysis) but with progress
    /// callbacks, for callers that stream part updates onward.
    pub async fn start_analysis_observed(
        &self,
        session_id: &str,
        source: TriggerSource,
        observer: &dyn AnalysisObserver,
    ) -> ApexResult<AnalysisResult> {
        let session = self.store.get_session(session_id).await?;

        let len = session.problem_statement.chars().count();
        if !(MIN_PROBLEM_LEN..=MAX_PROBLEM_LEN).contains(&len) {
            return Err(ApexError::new(
                ErrorCode::ProblemStatementOutOfRange,
                ErrorCategory::Analysis,
                ErrorSeverity::Medium,
                &format!(
                    "Problem statement must be {MIN_PROBLEM_LEN}-{MAX_PROBLEM_LEN} characters, got {len}"
                ),
            ));
        }

        info!(session_id, tier = %session.tier, source = source.as_str(), "analysis triggered");

        self.store
            .update_session_status(session_id, SessionStatus::Processing)
            .await?;
        self.store
            .create_result(session_id, session.tier)
            .await?;
        self.tracker
            .track_analysis_start(
                session_id,
                session.tier.as_str(),
                source,
                TrackOptions::default(),
            )
            .await;

        match self.engine.run(&session, observer).await {
            Ok(result) => {
                self.store
                    .update_session_status(session_id, SessionStatus::Completed)
                    .await?;
                Ok(result)
            }
            Err(err) => {
                error!(session_id, error = %err, "analysis failed");
                // Keep the session in a terminal state even when the status
                // write itself hiccups; the run error is what callers act on.
                if let Err(status_err) = self
                    .store
                    .update_session_status(session_id, SessionStatus::Failed)
                    .await
                {
                    error!(session_id, error = %status_err, "failed to mark session failed");
                }
                Err(err)
            }
        }
    }
}
