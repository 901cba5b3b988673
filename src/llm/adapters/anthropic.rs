//! Anthropic-dialect adapter: system prompt pulled out of the message
//! list, tool use/tool result translated to content blocks, one
//! `stream: false` request with the parsed body returned directly.

use crate::llm::adapters::ProviderAdapter;
use crate::llm::normalizer;
use crate::llm::provider::{DispatchResponse, Message, ProviderError, ProviderKind, Role, Tool, ToolCall};
use serde::{Deserialize, Serialize};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicAdapter {
    client: reqwest::Client,
    api_key: String,
}

impl AnthropicAdapter {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
}

#[derive(Serialize)]
struct WireMessage {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
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

/// Pull the system prompt out of the history (if present) and build one
/// `WireMessage` per remaining turn. Tool results always attach to a `user`
/// role message, per Anthropic's content-block convention.
fn build_wire_messages(system_prompt: Option<&str>, messages: &[Message]) -> (Option<String>, Vec<WireMessage>) {
    let mut system = system_prompt.map(|s| s.to_string());
    let mut out = Vec::with_capacity(messages.len());

    for msg in messages {
        match msg.role {
            Role::System => {
                if system.is_none() {
                    system = Some(msg.content.clone());
                }
            }
            Role::User => {
                out.push(WireMessage {
                    role: "user".to_string(),
                    content: vec![ContentBlock::Text {
                        text: msg.content.clone(),
                    }],
                });
            }
            Role::Assistant => {
                let mut blocks = Vec::new();
                if !msg.content.is_empty() {
                    blocks.push(ContentBlock::Text {
                        text: msg.content.clone(),
                    });
                }
                if let Some(calls) = &msg.tool_calls {
                    for call in calls {
                        blocks.push(ContentBlock::ToolUse {
                            id: call.id.clone(),
                            name: call.name.clone(),
                            input: call.arguments.clone(),
                        });
                    }
                }
                if !blocks.is_empty() {
                    out.push(WireMessage {
                        role: "assistant".to_string(),
                        content: blocks,
                    });
                }
            }
            Role::Tool => {
                if let Some(id) = &msg.tool_call_id {
                    out.push(WireMessage {
                        role: "user".to_string(),
                        content: vec![ContentBlock::ToolResult {
                            tool_use_id: id.clone(),
                            content: msg.content.clone(),
                        }],
                    });
                }
            }
        }
    }

    (system, out)
}

#[async_trait::async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn dispatch(
        &self,
        model: &str,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<DispatchResponse, ProviderError> {
        let (system, wire_messages) = build_wire_messages(system_prompt, messages);

        let wire_tools = if tools.is_empty() {
            None
        } else {
            Some(normalizer::normalize(tools, ProviderKind::Anthropic))
        };

        let request = MessagesRequest {
            model: model.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            messages: wire_messages,
            system,
            stream: false,
            tools: wire_tools,
        };

        let response = self
            .client
            .post(format!("{}/messages", ANTHROPIC_API_BASE))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status.as_u16(), &body));
        }

        let parsed: MessagesResponse = response.json().await?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for block in parsed.content {
            match block {
                ContentBlock::Text { text } => content.push_str(&text),
                ContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                    id,
                    name,
                    arguments: input,
                }),
                ContentBlock::ToolResult { .. } => {}
            }
        }

        let usage = parsed.usage.unwrap_or_default();

        Ok(DispatchResponse {
            content: if content.is_empty() { None } else { Some(content) },
            tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
            tokens_in: usage.input_tokens,
            tokens_out: usage.output_tokens,
        })
    }
}

fn map_http_error(status: u16, body: &str) -> ProviderError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .map(|b| b.error.message.clone())
        .unwrap_or_else(|| body.to_string());
    let error_type = parsed.and_then(|b| b.error.r#type).unwrap_or_default();

    match (status, error_type.as_str()) {
        (401, _) => ProviderError::AuthenticationFailed,
        (429, _) => ProviderError::RateLimitExceeded,
        (_, "invalid_request_error") if message.to_lowercase().contains("model") => {
            ProviderError::ModelNotFound(message)
        }
        (400, _) if message.to_lowercase().contains("quota")
            || message.to_lowercase().contains("credit") =>
        {
            ProviderError::QuotaExceeded
        }
        _ => ProviderError::ApiError(format!("HTTP {}: {}", status, message)),
    }
}
