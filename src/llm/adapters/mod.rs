//! Provider adapters: single-shot, non-streaming dispatch to
//! each backend's chat-completions endpoint.
//!
//! The iteration loop wants one uniform, awaitable call per turn —
//! `dispatch(model, system_prompt, messages, tools) -> DispatchResponse` —
//! so each adapter here owns just enough HTTP plumbing to satisfy that
//! contract, translating the canonical [`Message`]/[`Tool`] types to and
//! from its backend's wire format.

pub mod anthropic;
pub mod gemini;
pub mod openai;

use crate::llm::provider::{DispatchResponse, Message, ProviderError, ProviderKind, Tool};

pub use anthropic::AnthropicAdapter;
pub use gemini::GeminiAdapter;
pub use openai::OpenAiAdapter;

/// One non-streaming round-trip to a provider's chat-completions endpoint.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn dispatch(
        &self,
        model: &str,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<DispatchResponse, ProviderError>;
}

/// Build the adapter for `kind` from an API key, picking the right HTTP
/// base URL. `base_url_override` lets a Perplexity (OpenAI-compatible)
/// deployment reuse [`OpenAiAdapter`] with its own endpoint.
pub fn build_adapter(
    kind: ProviderKind,
    api_key: String,
    base_url_override: Option<String>,
) -> Box<dyn ProviderAdapter> {
    match kind {
        ProviderKind::OpenAi => Box::new(OpenAiAdapter::new(
            api_key,
            base_url_override.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            ProviderKind::OpenAi,
        )),
        ProviderKind::Perplexity => Box::new(OpenAiAdapter::new(
            api_key,
            base_url_override.unwrap_or_else(|| "https://api.perplexity.ai".to_string()),
            ProviderKind::Perplexity,
        )),
        ProviderKind::Anthropic => Box::new(AnthropicAdapter::new(api_key)),
        ProviderKind::Gemini => Box::new(GeminiAdapter::new(api_key)),
    }
}
