//! Gemini-dialect adapter.
//!
//! Gemini's `functionCall` parts carry only a function *name*, never an id,
//! so the canonical `ToolCall.id` has to be minted on the way in and tracked
//! on the way back out. We keep a per-dispatch map from minted id to
//! function name (mirroring [`crate::llm::gemini`]'s `GeminiToolCallMeta`)
//! so a later `tool` message's `tool_call_id` can be translated back to the
//! `functionResponse.name` Gemini expects.

use crate::llm::adapters::ProviderAdapter;
use crate::llm::normalizer;
use crate::llm::provider::{DispatchResponse, Message, ProviderError, ProviderKind, Role, Tool, ToolCall};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiAdapter {
    client: reqwest::Client,
    api_key: String,
}

impl GeminiAdapter {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "systemInstruction")]
    system_instruction: Option<SystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiToolDecl>>,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<TextPart>,
}

#[derive(Serialize)]
struct TextPart {
    text: String,
}

#[derive(Serialize)]
struct GeminiToolDecl {
    #[serde(rename = "functionDeclarations")]
    function_declarations: Vec<serde_json::Value>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Default)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "functionCall")]
    function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "functionResponse")]
    function_response: Option<FunctionResponse>,
}

#[derive(Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    args: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata", default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content2,
    #[serde(rename = "finishReason", default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Content2 {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize, Default)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: u32,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Translate canonical history into Gemini `contents`, building the
/// id -> function-name map used to resolve `tool` messages into
/// `functionResponse` parts. A tool-response whose content does not parse
/// as a JSON object or array is wrapped as `{"result": <string>}`, since
/// Gemini's `functionResponse.response` must be a structured value.
fn build_contents(messages: &[Message]) -> (Vec<Content>, HashMap<String, String>) {
    let mut contents = Vec::with_capacity(messages.len());
    let mut id_to_name: HashMap<String, String> = HashMap::new();

    for msg in messages {
        match msg.role {
            Role::System => continue,
            Role::User => {
                contents.push(Content {
                    role: "user".to_string(),
                    parts: vec![Part {
                        text: Some(msg.content.clone()),
                        ..Default::default()
                    }],
                });
            }
            Role::Assistant => {
                let mut parts = Vec::new();
                if !msg.content.is_empty() {
                    parts.push(Part {
                        text: Some(msg.content.clone()),
                        ..Default::default()
                    });
                }
                if let Some(calls) = &msg.tool_calls {
                    for call in calls {
                        id_to_name.insert(call.id.clone(), call.name.clone());
                        parts.push(Part {
                            function_call: Some(FunctionCall {
                                name: call.name.clone(),
                                args: call.arguments.clone(),
                            }),
                            ..Default::default()
                        });
                    }
                }
                if !parts.is_empty() {
                    contents.push(Content {
                        role: "model".to_string(),
                        parts,
                    });
                }
            }
            Role::Tool => {
                let Some(id) = &msg.tool_call_id else { continue };
                let name = id_to_name.get(id).cloned().unwrap_or_default();
                let response = match serde_json::from_str::<serde_json::Value>(&msg.content).ok() {
                    Some(v) if v.is_object() => v,
                    Some(v) if v.is_array() => serde_json::json!({"results": v}),
                    _ => serde_json::json!({"result": msg.content}),
                };
                contents.push(Content {
                    role: "user".to_string(),
                    parts: vec![Part {
                        function_response: Some(FunctionResponse { name, response }),
                        ..Default::default()
                    }],
                });
            }
        }
    }

    (contents, id_to_name)
}

#[async_trait::async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn dispatch(
        &self,
        model: &str,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<DispatchResponse, ProviderError> {
        let (contents, _id_to_name) = build_contents(messages);

        let system_instruction = system_prompt.map(|s| SystemInstruction {
            parts: vec![TextPart { text: s.to_string() }],
        });

        let wire_tools = if tools.is_empty() {
            None
        } else {
            let declarations = normalizer::normalize(tools, ProviderKind::Gemini);
            Some(vec![GeminiToolDecl {
                function_declarations: declarations,
            }])
        };

        let request = GenerateContentRequest {
            contents,
            system_instruction,
            tools: wire_tools,
        };

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            GEMINI_API_BASE, model, self.api_key
        );

        let response = self.client.post(url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status.as_u16(), &body));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ApiError("response had no candidates".to_string()))?;

        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(ProviderError::SafetyBlocked);
        }
        if candidate.finish_reason.as_deref() == Some("MAX_TOKENS") {
            return Err(ProviderError::MaxTokensReached);
        }

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for part in candidate.content.parts {
            if let Some(text) = part.text {
                content.push_str(&text);
            }
            if let Some(call) = part.function_call {
                // Gemini never echoes back an id: mint a fresh one so the
                // canonical history can still correlate results.
                tool_calls.push(ToolCall {
                    id: format!("gemini-call-{}", uuid::Uuid::new_v4()),
                    name: call.name,
                    arguments: call.args,
                });
            }
        }

        let usage = parsed.usage_metadata.unwrap_or_default();

        Ok(DispatchResponse {
            content: if content.is_empty() { None } else { Some(content) },
            tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
            tokens_in: usage.prompt_token_count,
            tokens_out: usage.candidates_token_count,
        })
    }
}

fn map_http_error(status: u16, body: &str) -> ProviderError {
    let parsed: Option<ErrorEnvelope> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .map(|b| b.error.message.clone())
        .unwrap_or_else(|| body.to_string());
    let status_code = parsed.and_then(|b| b.error.status).unwrap_or_default();

    match (status, status_code.as_str()) {
        (401, _) | (403, "PERMISSION_DENIED") => ProviderError::AuthenticationFailed,
        (429, _) | (_, "RESOURCE_EXHAUSTED") => ProviderError::RateLimitExceeded,
        (404, _) | (_, "NOT_FOUND") => ProviderError::ModelNotFound(message),
        (400, "INVALID_ARGUMENT") if message.to_lowercase().contains("function") => {
            ProviderError::MalformedFunctionCall { tool_names: Vec::new() }
        }
        _ => ProviderError::ApiError(format!("HTTP {}: {}", status, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_call_minted_id_tracked_by_name() {
        let call = ToolCall {
            id: "local-1".to_string(),
            name: "list_processors".to_string(),
            arguments: serde_json::json!({}),
        };
        let messages = vec![Message::assistant_tool_calls("", vec![call])];
        let (_, map) = build_contents(&messages);
        assert_eq!(map.get("local-1").map(String::as_str), Some("list_processors"));
    }

    #[test]
    fn non_object_tool_result_gets_wrapped() {
        let messages = vec![
            Message::assistant_tool_calls(
                "",
                vec![ToolCall {
                    id: "local-1".to_string(),
                    name: "count".to_string(),
                    arguments: serde_json::json!({}),
                }],
            ),
            Message::tool_result("local-1", "42"),
        ];
        let (contents, _) = build_contents(&messages);
        let response_part = &contents[1].parts[0];
        let response = response_part.function_response.as_ref().unwrap();
        assert_eq!(response.response, serde_json::json!({"result": "42"}));
    }

    #[test]
    fn list_shaped_tool_result_is_wrapped_under_results_key() {
        let messages = vec![
            Message::assistant_tool_calls(
                "",
                vec![ToolCall {
                    id: "local-1".to_string(),
                    name: "list_processors".to_string(),
                    arguments: serde_json::json!({}),
                }],
            ),
            Message::tool_result("local-1", r#"["A", "B"]"#),
        ];
        let (contents, _) = build_contents(&messages);
        let response_part = &contents[1].parts[0];
        let response = response_part.function_response.as_ref().unwrap();
        assert_eq!(response.response, serde_json::json!({"results": ["A", "B"]}));
    }

    #[test]
    fn object_shaped_tool_result_passes_through_unwrapped() {
        let messages = vec![
            Message::assistant_tool_calls(
                "",
                vec![ToolCall {
                    id: "local-1".to_string(),
                    name: "get_status".to_string(),
                    arguments: serde_json::json!({}),
                }],
            ),
            Message::tool_result("local-1", r#"{"status": "ok"}"#),
        ];
        let (contents, _) = build_contents(&messages);
        let response_part = &contents[1].parts[0];
        let response = response_part.function_response.as_ref().unwrap();
        assert_eq!(response.response, serde_json::json!({"status": "ok"}));
    }

    #[test]
    fn safety_and_max_tokens_map_to_distinct_errors() {
        assert!(matches!(map_http_error(429, "{}"), ProviderError::RateLimitExceeded));
    }
}
