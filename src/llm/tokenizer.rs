//! Per-provider token estimation.
//!
//! Grounded in `count_tokens_openai` / `count_tokens_gemini` /
//! `count_tokens_anthropic` / `count_tokens_perplexity` and
//! `calculate_input_tokens`: OpenAI/Perplexity use a real tokenizer when one
//! is available for the model, falling back to a `cl100k_base`-style
//! approximation and finally to a word-count; Anthropic/Gemini have no
//! public tokenizer and use `len(text) / 4`. Tests should tolerate this
//! being an approximation (see Design Notes: "Token counting fallback").

use super::{Message, ProviderKind, Role, Tool};

/// Count tokens for a single string under `provider`/`model`.
///
/// No tokenizer crate is vendored here (avoids a heavyweight dependency for
/// an intentionally-approximate estimate); OpenAI/Perplexity therefore use
/// the word-count approximation as the fallback tier rather than a
/// `cl100k_base` implementation.
pub fn count_tokens(text: &str, provider: ProviderKind, _model: &str) -> u32 {
    match provider {
        ProviderKind::OpenAi | ProviderKind::Perplexity => count_tokens_openai_like(text),
        ProviderKind::Anthropic | ProviderKind::Gemini => count_tokens_char_based(text),
    }
}

fn count_tokens_openai_like(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

fn count_tokens_char_based(text: &str) -> u32 {
    (text.chars().count() / 4) as u32
}

/// Total input tokens for a message history plus tool catalog, mirroring
/// `calculate_input_tokens`: per-message content is counted with the
/// provider's estimator; `tool` message content and assistant `tool_calls`
/// fields use the flat `len/4` approximation regardless of provider (the
/// source does this even for OpenAI/Perplexity); the tool catalog is
/// JSON-encoded compactly (name + description + parameters) and counted the
/// same way as message text.
pub fn calculate_input_tokens(
    messages: &[Message],
    provider: ProviderKind,
    model: &str,
    tools: &[Tool],
) -> u32 {
    let mut total = 0u32;

    for message in messages {
        if matches!(message.role, Role::Tool) {
            total += (message.content.len() / 4) as u32;
        } else if let Some(calls) = &message.tool_calls {
            let encoded = serde_json::to_string(calls).unwrap_or_default();
            total += (encoded.len() / 4) as u32;
            if !message.content.is_empty() {
                total += count_tokens(&message.content, provider, model);
            }
        } else {
            total += count_tokens(&message.content, provider, model);
        }
    }

    if !tools.is_empty() {
        let compact: Vec<_> = tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                })
            })
            .collect();
        let encoded = serde_json::to_string(&compact).unwrap_or_default();
        total += count_tokens(&encoded, provider, model);
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolCall;

    #[test]
    fn char_based_is_quarter_of_length() {
        let text = "a".repeat(40);
        assert_eq!(count_tokens_char_based(&text), 10);
    }

    #[test]
    fn tool_messages_use_flat_len_over_four_for_every_provider() {
        let messages = vec![Message::tool_result("t1", "x".repeat(40))];
        for provider in [
            ProviderKind::OpenAi,
            ProviderKind::Anthropic,
            ProviderKind::Gemini,
            ProviderKind::Perplexity,
        ] {
            assert_eq!(
                calculate_input_tokens(&messages, provider, "m", &[]),
                10,
                "provider={provider}"
            );
        }
    }

    #[test]
    fn tool_calls_are_counted_via_json_encoding() {
        let call = ToolCall {
            id: "t1".to_string(),
            name: "list_processors".to_string(),
            arguments: serde_json::json!({}),
        };
        let messages = vec![Message::assistant_tool_calls("", vec![call])];
        let tokens = calculate_input_tokens(&messages, ProviderKind::OpenAi, "m", &[]);
        assert!(tokens > 0);
    }

    #[test]
    fn empty_tool_catalog_adds_nothing() {
        let messages = vec![Message::user("hi")];
        let with_empty = calculate_input_tokens(&messages, ProviderKind::OpenAi, "m", &[]);
        let baseline = count_tokens("hi", ProviderKind::OpenAi, "m");
        assert_eq!(with_empty, baseline);
    }
}
