use serde::{Deserialize, Serialize};

use crate::types::{ConversationMessage, SearchSource};

/// Wire request for the chat-completion endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayRequest {
    pub model: String,
    pub messages: Vec<ConversationMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub search_mode: String,
    pub return_related_questions: bool,
    pub web_search_options: WebSearchOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebSearchOptions {
    pub search_context_size: String,
}

/// Token usage reported by a single gateway call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayMessage {
    pub role: String,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayChoice {
    pub index: u32,
    pub message: GatewayMessage,
    pub finish_reason: Option<String>,
}

/// Wire response from the chat-completion endpoint. `search_results` is only
/// present when the provider performed a web search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub id: String,
    pub model: String,
    pub created: u64,
    #[serde(default)]
    pub usage: GatewayUsage,
    pub choices: Vec<GatewayChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_results: Option<Vec<SearchSource>>,
}

impl GatewayResponse {
    /// First choice's content. A malformed or empty response yields an empty
    /// string, not an error; only transport/API failures are fatal.
    pub fn content(&self) -> String {
        self.choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default()
    }

    pub fn total_tokens(&self) -> u32 {
        self.usage.total_tokens
    }
}
