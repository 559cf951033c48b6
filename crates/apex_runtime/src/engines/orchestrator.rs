//! Sequential multi-part analysis orchestration.
//!
//! Drives N strictly ordered LLM turns for one session (N = 1, 2, or 4 by
//! tier), growing a conversation transcript as parts complete, aggregating
//! token counts and deduplicated citations, and writing each part through to
//! persistence the moment it lands. A failed part aborts the remaining
//! sequence; retry is an external trigger-source concern, never handled here.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use telemetry::{SafeOperationTracker, TrackOptions};

use crate::engines::llm::GatewayClient;
use crate::errors::{ApexError, ApexResult};
use crate::persistence::SessionStore;
use crate::prompts::TierPromptService;
use crate::sanitizer;
use crate::types::{
    AnalysisResult, AnalysisSession, ConversationMessage, PartStatus, ResultUpdate, SearchSource,
};

/// Progress callbacks invoked synchronously as a run advances. All methods
/// default to no-ops; implement only what you need.
pub trait AnalysisObserver: Send + Sync {
    fn on_part_start(&self, _part_number: u32) {}
    fn on_part_complete(&self, _part_number: u32, _content: &str) {}
    fn on_complete(&self, _result: &AnalysisResult) {}
    fn on_error(&self, _error: &ApexError) {}
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl AnalysisObserver for NoopObserver {}

/// The sequential analysis state machine.
///
/// Each invocation owns its own transcript; nothing is shared across
/// sessions, so any number of sessions may run concurrently as independent
/// flows.
pub struct AnalysisEngine {
    gateway: Arc<dyn GatewayClient>,
    store: Arc<dyn SessionStore>,
    tracker: SafeOperationTracker,
    prompts: TierPromptService,
}

impl AnalysisEngine {
    pub fn new(
        gateway: Arc<dyn GatewayClient>,
        store: Arc<dyn SessionStore>,
        tracker: SafeOperationTracker,
    ) -> Self {
        Self {
            gateway,
            store,
            tracker,
            prompts: TierPromptService::new(),
        }
    }

    /// Runs every part of the session's tier in order and returns the
    /// assembled result. Parts already written stay persisted even when a
    /// later part fails.
    pub async fn run(
        &self,
        session: &AnalysisSession,
        observer: &dyn AnalysisObserver,
    ) -> ApexResult<AnalysisResult> {
        let session_id = session.session_id.as_str();
        let tier = session.tier;
        let total_parts = tier.part_count();
        let started = Instant::now();

        // Flags are observational only; the run proceeds on the sanitized
        // text no matter what matched.
        let sanitized = sanitizer::sanitize(&session.problem_statement);
        self.prompts.validate(&sanitized.text)?;

        info!(session_id, %tier, total_parts, "starting sequential analysis");

        // User/assistant turns only. The system prompt for each part is
        // recomputed fresh and prepended per call, never carried over.
        let mut transcript: Vec<ConversationMessage> = Vec::new();
        let mut parts: Vec<String> = Vec::with_capacity(total_parts as usize);
        let mut sources: Vec<SearchSource> = Vec::new();
        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut total_tokens: u32 = 0;

        for part_number in 1..=total_parts {
            let part_started = Instant::now();
            let user_prompt = if part_number == 1 {
                self.prompts.initial_prompt(tier, &sanitized.text)
            } else {
                self.prompts.continuation_prompt(tier, part_number)?
            };
            transcript.push(ConversationMessage::user(user_prompt));

            observer.on_part_start(part_number);
            self.tracker
                .track_part_start(session_id, part_number as i32, TrackOptions::default())
                .await;
            self.store
                .update_result(
                    session_id,
                    ResultUpdate {
                        part_status: Some((part_number, PartStatus::InProgress)),
                        ..Default::default()
                    },
                )
                .await?;

            let mut messages =
                Vec::with_capacity(transcript.len() + 1);
            messages.push(ConversationMessage::system(self.prompts.system_prompt(
                tier,
                &sanitized.text,
                part_number,
            )));
            messages.extend(transcript.iter().cloned());

            let ceiling = self.prompts.max_tokens_for_part(tier, part_number);
            let response = match self.gateway.complete(&messages, ceiling).await {
                Ok(response) => response,
                Err(err) => {
                    self.handle_part_failure(session_id, part_number, total_parts, &parts, &err)
                        .await;
                    observer.on_error(&err);
                    return Err(err);
                }
            };

            // Missing content is an empty part, not an error.
            let content = response.content();
            transcript.push(ConversationMessage::assistant(content.clone()));
            total_tokens += response.total_tokens();

            // Dedup citations by URL, first occurrence wins for title/date.
            for source in response.search_results.unwrap_or_default() {
                if seen_urls.insert(source.url.clone()) {
                    sources.push(source);
                }
            }

            observer.on_part_complete(part_number, &content);
            self.tracker
                .track_part_complete(
                    session_id,
                    part_number as i32,
                    &content,
                    Some(part_started.elapsed().as_millis() as u64),
                    TrackOptions::default(),
                )
                .await;

            info!(
                session_id,
                part_number,
                total_parts,
                content_len = content.len(),
                "part completed"
            );

            // Write-through: partial results stay visible even if a later
            // part fails.
            self.store
                .update_result(
                    session_id,
                    ResultUpdate {
                        part: Some((part_number, content.clone())),
                        part_status: Some((part_number, PartStatus::Completed)),
                        search_results: Some(sources.clone()),
                        total_tokens: Some(total_tokens),
                        ..Default::default()
                    },
                )
                .await?;

            parts.push(content);
        }

        let full_markdown = self.assemble_document(tier, &parts, &sources);
        let generated_at = chrono::Utc::now();

        self.store
            .update_result(
                session_id,
                ResultUpdate {
                    full_markdown: Some(full_markdown.clone()),
                    generated_at: Some(generated_at),
                    ..Default::default()
                },
            )
            .await?;

        let result = AnalysisResult {
            session_id: session_id.to_string(),
            part_status: vec![PartStatus::Completed; parts.len()],
            parts,
            full_markdown,
            search_results: sources,
            total_tokens,
            generated_at: Some(generated_at),
        };

        self.tracker
            .track_analysis_complete(
                session_id,
                Some(started.elapsed().as_millis() as u64),
                TrackOptions::default(),
            )
            .await;
        observer.on_complete(&result);

        info!(
            session_id,
            total_tokens,
            sources = result.search_results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "analysis completed"
        );

        Ok(result)
    }

    /// Reports a fatal part failure through the non-throwing tracker channel
    /// and marks the part failed. The tracker channel never masks or delays
    /// the erroring one; a failed status write is logged and absorbed here
    /// because the gateway error is the one the caller must see.
    async fn handle_part_failure(
        &self,
        session_id: &str,
        part_number: u32,
        total_parts: u32,
        completed: &[String],
        err: &ApexError,
    ) {
        warn!(
            session_id,
            part_number,
            error = %err,
            "part failed, aborting remaining sequence"
        );

        self.tracker
            .track_part_failure(
                session_id,
                part_number as i32,
                &err.message,
                &format!("{:?}", err.code),
                TrackOptions::default(),
            )
            .await;
        if !completed.is_empty() {
            self.tracker
                .track_partial_success(
                    session_id,
                    completed.len() as u32,
                    total_parts,
                    TrackOptions::default(),
                )
                .await;
        }
        self.tracker
            .track_analysis_failure(
                session_id,
                &err.message,
                Some(part_number as i32),
                TrackOptions::default(),
            )
            .await;

        if let Err(store_err) = self
            .store
            .update_result(
                session_id,
                ResultUpdate {
                    part_status: Some((part_number, PartStatus::Failed)),
                    ..Default::default()
                },
            )
            .await
        {
            warn!(session_id, error = %store_err, "failed to record part failure status");
        }
    }

    /// Concatenates the tier header, each part under its heading, and the
    /// rendered citation list into the final document.
    fn assemble_document(
        &self,
        tier: crate::types::Tier,
        parts: &[String],
        sources: &[SearchSource],
    ) -> String {
        let mut blocks: Vec<String> = Vec::with_capacity(parts.len() * 2 + 3);
        blocks.push(format!("{}\n", self.prompts.document_title(tier)));

        for (idx, content) in parts.iter().enumerate() {
            let part_number = idx as u32 + 1;
            blocks.push("---\n".to_string());
            blocks.push(format!("{}\n", self.prompts.part_heading(tier, part_number)));
            blocks.push(content.clone());
        }

        blocks.push("\n---\n".to_string());
        blocks.push("## Sources & References\n".to_string());
        if sources.is_empty() {
            blocks.push("No external sources cited.".to_string());
        } else {
            let rendered: Vec<String> = sources
                .iter()
                .enumerate()
                .map(|(i, s)| match &s.date {
                    Some(date) => format!("{}. [{}]({}) ({})", i + 1, s.title, s.url, date),
                    None => format!("{}. [{}]({})", i + 1, s.title, s.url),
                })
                .collect();
            blocks.push(rendered.join("\n"));
        }

        blocks.join("\n")
    }
}
