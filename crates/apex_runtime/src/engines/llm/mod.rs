pub mod providers;
pub mod types;

use async_trait::async_trait;

use crate::errors::ApexResult;
use crate::types::ConversationMessage;
use types::GatewayResponse;

/// Stateless seam between the orchestrator and the external LLM search API.
///
/// One call per part: the full message slice (fresh system prompt plus the
/// accumulated transcript) goes out, structured content plus usage/citation
/// metadata comes back. Transport and auth problems fail fast as a single
/// error per call.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[ConversationMessage],
        max_tokens: u32,
    ) -> ApexResult<GatewayResponse>;
}
