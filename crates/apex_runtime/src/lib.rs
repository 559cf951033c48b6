/*!
# Apex Runtime - Sequential UX Analysis Orchestrator

This crate contains the core analysis runtime.
It turns one paid session into a tiered, multi-part strategy document by
driving a sequence of LLM search-API calls over a growing conversation
transcript.

## Architecture

The runtime consists of several key components:

- **Analysis Engine**: Sequential part-by-part orchestrator with write-through persistence
- **Tier Prompt Service**: Pure tier/part prompt and token-ceiling derivation
- **Gateway Client**: Trait seam over the external LLM search API (Perplexity provider included)
- **Session Store**: Persistence seam for sessions and incremental results
- **Analysis Service**: Trigger entry point owning session status transitions
- **Sanitizer**: Log-only prompt-injection flagging and delimiter escaping
*/

pub mod engines;
pub mod errors;
pub mod persistence;
pub mod prompts;
pub mod sanitizer;
pub mod trigger;
pub mod types;

// Re-export main components
pub use engines::llm::providers::PerplexityProvider;
pub use engines::llm::GatewayClient;
pub use engines::{AnalysisEngine, AnalysisObserver, NoopObserver};
pub use errors::{ApexError, ApexResult, ErrorCategory, ErrorCode, ErrorSeverity};
pub use persistence::{MemorySessionStore, SessionStore};
pub use prompts::TierPromptService;
pub use trigger::AnalysisService;
pub use types::{
    AnalysisResult, AnalysisSession, ConversationMessage, MessageRole, PartStatus, ResultUpdate,
    SearchSource, SessionStatus, Tier, TriggerSource,
};

/// Runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
