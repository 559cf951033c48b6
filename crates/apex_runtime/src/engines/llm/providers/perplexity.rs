use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::engines::llm::types::{GatewayRequest, GatewayResponse, WebSearchOptions};
use crate::engines::llm::GatewayClient;
use crate::errors::{ApexError, ApexResult, ErrorCategory, ErrorCode, ErrorSeverity};
use crate::types::ConversationMessage;

const PERPLEXITY_API_URL: &str = "https://api.perplexity.ai/chat/completions";
const DEFAULT_MODEL: &str = "sonar-pro";
const DEFAULT_TEMPERATURE: f32 = 0.3;
const DEFAULT_TIMEOUT_SECONDS: u64 = 120;

/// Gateway client for Perplexity's search-backed chat completions.
#[derive(Clone)]
pub struct PerplexityProvider {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl PerplexityProvider {
    pub fn new(api_key: &str) -> ApexResult<Self> {
        Self::with_timeout(api_key, DEFAULT_TIMEOUT_SECONDS)
    }

    pub fn with_timeout(api_key: &str, timeout_seconds: u64) -> ApexResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|_| {
            ApexError::new(
                ErrorCode::GatewayAuthentication,
                ErrorCategory::Gateway,
                ErrorSeverity::Critical,
                "API key contains invalid header characters",
            )
        })?;
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: PERPLEXITY_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        })
    }

    /// Reads `PERPLEXITY_API_KEY`; fails fast when missing so no paid
    /// analysis starts without credentials.
    pub fn from_env() -> ApexResult<Self> {
        let api_key = std::env::var("PERPLEXITY_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                ApexError::new(
                    ErrorCode::GatewayAuthentication,
                    ErrorCategory::Gateway,
                    ErrorSeverity::Critical,
                    "PERPLEXITY_API_KEY is not configured",
                )
            })?;
        Self::new(&api_key)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl GatewayClient for PerplexityProvider {
    async fn complete(
        &self,
        messages: &[ConversationMessage],
        max_tokens: u32,
    ) -> ApexResult<GatewayResponse> {
        let request = GatewayRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            max_tokens,
            temperature: self.temperature,
            search_mode: "web".to_string(),
            return_related_questions: false,
            web_search_options: WebSearchOptions {
                search_context_size: "high".to_string(),
            },
        };

        debug!(
            model = %self.model,
            messages = messages.len(),
            max_tokens,
            "dispatching gateway request"
        );

        let response = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApexError::from_gateway_status(status.as_u16(), &body));
        }

        let parsed = response.json::<GatewayResponse>().await.map_err(|err| {
            ApexError::new(
                ErrorCode::GatewayInvalidResponse,
                ErrorCategory::Gateway,
                ErrorSeverity::High,
                &format!("Failed to decode gateway response: {}", err),
            )
        })?;

        Ok(parsed)
    }
}
