//! OpenAI-dialect adapter: also serves Perplexity, whose API is
//! OpenAI-compatible aside from the base URL and its narrower model list.
//! Issues a single `stream: false` request and returns the parsed JSON
//! body directly.

use crate::llm::adapters::ProviderAdapter;
use crate::llm::normalizer;
use crate::llm::provider::{DispatchResponse, Message, ProviderError, ProviderKind, Role, Tool, ToolCall};
use serde::{Deserialize, Serialize};

pub struct OpenAiAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    kind: ProviderKind,
}

impl OpenAiAdapter {
    pub fn new(api_key: String, base_url: String, kind: ProviderKind) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            kind,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OutgoingToolCall>>,
}

#[derive(Serialize)]
struct OutgoingToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: OutgoingFunction,
}

#[derive(Serialize)]
struct OutgoingFunction {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<IncomingToolCall>>,
}

#[derive(Deserialize)]
struct IncomingToolCall {
    id: String,
    function: IncomingFunction,
}

#[derive(Deserialize)]
struct IncomingFunction {
    name: String,
    arguments: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
    #[serde(default)]
    r#type: Option<String>,
}

fn to_wire_message(msg: &Message) -> ChatMessage {
    let role = match msg.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };

    let tool_calls = msg.tool_calls.as_ref().map(|calls| {
        calls
            .iter()
            .map(|c| OutgoingToolCall {
                id: c.id.clone(),
                call_type: "function".to_string(),
                function: OutgoingFunction {
                    name: c.name.clone(),
                    arguments: serde_json::to_string(&c.arguments).unwrap_or_default(),
                },
            })
            .collect()
    });

    ChatMessage {
        role: role.to_string(),
        content: if msg.content.is_empty() && tool_calls.is_some() {
            None
        } else {
            Some(msg.content.clone())
        },
        tool_call_id: msg.tool_call_id.clone(),
        tool_calls,
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn dispatch(
        &self,
        model: &str,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<DispatchResponse, ProviderError> {
        let mut wire_messages = Vec::with_capacity(messages.len() + 1);
        if let Some(sys) = system_prompt {
            wire_messages.push(ChatMessage {
                role: "system".to_string(),
                content: Some(sys.to_string()),
                tool_call_id: None,
                tool_calls: None,
            });
        }
        wire_messages.extend(messages.iter().map(to_wire_message));

        let wire_tools = if tools.is_empty() {
            None
        } else {
            Some(normalizer::normalize(tools, self.kind))
        };

        let request = ChatRequest {
            model: model.to_string(),
            messages: wire_messages,
            stream: false,
            tool_choice: if tools.is_empty() { None } else { Some("auto") },
            tools: wire_tools,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status.as_u16(), &body));
        }

        let parsed: ChatResponse = response.json().await?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ApiError("response had no choices".to_string()))?;

        let tool_calls = choice.message.tool_calls.map(|calls| {
            calls
                .into_iter()
                .map(|c| {
                    let arguments = serde_json::from_str(&c.function.arguments)
                        .unwrap_or(serde_json::Value::Null);
                    ToolCall {
                        id: c.id,
                        name: c.function.name,
                        arguments,
                    }
                })
                .collect()
        });

        let usage = parsed.usage.unwrap_or_default();

        Ok(DispatchResponse {
            content: choice.message.content,
            tool_calls,
            tokens_in: usage.prompt_tokens,
            tokens_out: usage.completion_tokens,
        })
    }
}

/// Map an HTTP status + JSON error body to the taxonomy the loop inspects.
fn map_http_error(status: u16, body: &str) -> ProviderError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .map(|b| b.error.message.clone())
        .unwrap_or_else(|| body.to_string());
    let error_type = parsed.and_then(|b| b.error.r#type).unwrap_or_default();

    match status {
        401 => ProviderError::AuthenticationFailed,
        403 if error_type.contains("quota") || message.to_lowercase().contains("quota") => {
            ProviderError::QuotaExceeded
        }
        429 => ProviderError::RateLimitExceeded,
        404 => ProviderError::ModelNotFound(message),
        408 | 504 => ProviderError::Timeout,
        _ => ProviderError::ApiError(format!("HTTP {}: {}", status, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_401_to_auth_error() {
        assert!(matches!(
            map_http_error(401, "{}"),
            ProviderError::AuthenticationFailed
        ));
    }

    #[test]
    fn maps_429_to_rate_limit() {
        assert!(matches!(
            map_http_error(429, "{}"),
            ProviderError::RateLimitExceeded
        ));
    }

    #[test]
    fn to_wire_message_keeps_null_content_for_pure_tool_call_turn() {
        let msg = Message::assistant_tool_calls(
            "",
            vec![ToolCall {
                id: "1".into(),
                name: "list_processors".into(),
                arguments: serde_json::json!({}),
            }],
        );
        let wire = to_wire_message(&msg);
        assert!(wire.content.is_none());
        assert!(wire.tool_calls.is_some());
    }
}
