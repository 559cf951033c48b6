use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{ApexError, ApexResult, ErrorCategory, ErrorCode, ErrorSeverity};

pub use telemetry::TriggerSource;

/// Purchasable service level. Determines how many sequential parts the
/// analysis runs and which prompt set is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Standard,
    Medium,
    Full,
}

impl Tier {
    /// Number of sequential LLM turns this tier runs.
    pub fn part_count(&self) -> u32 {
        match self {
            Tier::Standard => 1,
            Tier::Medium => 2,
            Tier::Full => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Standard => "standard",
            Tier::Medium => "medium",
            Tier::Full => "full",
        }
    }
}

impl FromStr for Tier {
    type Err = ApexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Tier::Standard),
            "medium" => Ok(Tier::Medium),
            "full" => Ok(Tier::Full),
            other => Err(ApexError::new(
                ErrorCode::InvalidTier,
                ErrorCategory::Configuration,
                ErrorSeverity::High,
                &format!("Unknown tier: {}", other),
            )),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    PendingPayment,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// One purchased report request. Owned by the persistence layer; the
/// orchestrator only reads `tier`/`problem_statement` and requests status
/// transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSession {
    pub session_id: String,
    pub tier: Tier,
    pub problem_statement: String,
    pub status: SessionStatus,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisSession {
    pub fn new(tier: Tier, problem_statement: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            tier,
            problem_statement: problem_statement.into(),
            status: SessionStatus::PendingPayment,
            user_id: None,
            email: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A cited source returned by the gateway's web search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSource {
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// The accumulating output of one session. Mutated incrementally by the
/// orchestrator (one write per completed part) and finalized once at
/// sequence end. Never deleted; a retried session overwrites prior parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub session_id: String,
    /// Part contents in order; index 0 holds part 1.
    pub parts: Vec<String>,
    pub part_status: Vec<PartStatus>,
    /// The assembled final document, populated only on full success.
    pub full_markdown: String,
    /// Deduplicated by URL, insertion order preserved.
    pub search_results: Vec<SearchSource>,
    pub total_tokens: u32,
    pub generated_at: Option<DateTime<Utc>>,
}

impl AnalysisResult {
    /// Empty result with one pending slot per part of the tier.
    pub fn empty(session_id: impl Into<String>, tier: Tier) -> Self {
        let n = tier.part_count() as usize;
        Self {
            session_id: session_id.into(),
            parts: vec![String::new(); n],
            part_status: vec![PartStatus::Pending; n],
            full_markdown: String::new(),
            search_results: Vec::new(),
            total_tokens: 0,
            generated_at: None,
        }
    }

    pub fn completed_part_count(&self) -> u32 {
        self.part_status
            .iter()
            .filter(|s| **s == PartStatus::Completed)
            .count() as u32
    }
}

/// Partial-field update applied to a stored result. Absent fields are left
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct ResultUpdate {
    /// (part_number, content); part numbers are 1-based.
    pub part: Option<(u32, String)>,
    pub part_status: Option<(u32, PartStatus)>,
    pub full_markdown: Option<String>,
    pub search_results: Option<Vec<SearchSource>>,
    pub total_tokens: Option<u32>,
    pub generated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A single role-tagged turn in the conversation transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ConversationMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}
