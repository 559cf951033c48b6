//! Storage seam for sessions and results.
//!
//! The runtime has no opinion on the storage engine: it calls these abstract
//! read/update operations and treats any failure as fatal to the current
//! write (failures propagate to the trigger handler, which marks the session
//! failed; the orchestrator never retries persistence writes itself).

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::errors::{ApexError, ApexResult};
use crate::types::{AnalysisResult, AnalysisSession, ResultUpdate, SessionStatus, Tier};

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_session(&self, session_id: &str) -> ApexResult<AnalysisSession>;

    async fn get_result(&self, session_id: &str) -> ApexResult<AnalysisResult>;

    /// Initializes the result row with one empty slot per part of the tier.
    /// A retried session re-initializes; nothing is ever deleted.
    async fn create_result(&self, session_id: &str, tier: Tier) -> ApexResult<()>;

    /// Applies a partial-field update to the stored result.
    async fn update_result(&self, session_id: &str, update: ResultUpdate) -> ApexResult<()>;

    async fn update_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> ApexResult<()>;
}

/// In-memory store for tests and embedders running without a database.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, AnalysisSession>>,
    results: RwLock<HashMap<String, AnalysisResult>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_session(&self, session: AnalysisSession) {
        self.sessions
            .write()
            .await
            .insert(session.session_id.clone(), session);
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_session(&self, session_id: &str) -> ApexResult<AnalysisSession> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| ApexError::session_not_found(session_id))
    }

    async fn get_result(&self, session_id: &str) -> ApexResult<AnalysisResult> {
        self.results
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| ApexError::storage(&format!("No result row for session '{}'", session_id)))
    }

    async fn create_result(&self, session_id: &str, tier: Tier) -> ApexResult<()> {
        self.results
            .write()
            .await
            .insert(session_id.to_string(), AnalysisResult::empty(session_id, tier));
        Ok(())
    }

    async fn update_result(&self, session_id: &str, update: ResultUpdate) -> ApexResult<()> {
        let mut results = self.results.write().await;
        let result = results
            .get_mut(session_id)
            .ok_or_else(|| ApexError::storage(&format!("No result row for session '{}'", session_id)))?;

        if let Some((part_number, content)) = update.part {
            let idx = part_number.saturating_sub(1) as usize;
            if idx >= result.parts.len() {
                return Err(ApexError::storage(&format!(
                    "Part {} out of range for session '{}'",
                    part_number, session_id
                )));
            }
            result.parts[idx] = content;
        }
        if let Some((part_number, status)) = update.part_status {
            let idx = part_number.saturating_sub(1) as usize;
            if idx >= result.part_status.len() {
                return Err(ApexError::storage(&format!(
                    "Part {} out of range for session '{}'",
                    part_number, session_id
                )));
            }
            result.part_status[idx] = status;
        }
        if let Some(markdown) = update.full_markdown {
            result.full_markdown = markdown;
        }
        if let Some(sources) = update.search_results {
            result.search_results = sources;
        }
        if let Some(total) = update.total_tokens {
            result.total_tokens = total;
        }
        if let Some(generated_at) = update.generated_at {
            result.generated_at = Some(generated_at);
        }
        Ok(())
    }

    async fn update_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> ApexResult<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| ApexError::session_not_found(session_id))?;
        session.status = status;
        session.updated_at = Utc::now();
        Ok(())
    }
}
