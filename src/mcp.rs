//! MCP transport: the two operations the
//! engine needs from an MCP server, modeled as a trait so the tool executor
//! and iteration loop depend only on this contract, never on a concrete
//! stdio/HTTP transport.

use crate::llm::{Tool, ToolCall, ToolResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One tool entry as advertised by `list_tools`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct McpToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

impl From<McpToolDescriptor> for Tool {
    fn from(d: McpToolDescriptor) -> Self {
        Tool {
            name: d.name,
            description: d.description,
            parameters: d.input_schema,
            full_description: None,
        }
    }
}

/// A single typed content item returned by `call_tool` (text, or any other
/// MCP content kind passed through as opaque JSON).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum McpContentItem {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("tool error (code {code}): {message}")]
    ToolError {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("transport error: {0}")]
    TransportError(String),
}

/// The two operations the engine consumes from an MCP server.
#[async_trait]
pub trait McpClient: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<McpToolDescriptor>, McpError>;

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<Vec<McpContentItem>, McpError>;
}

/// Invoke `call` against `client`, flattening the typed content list into
/// the `{tool_output_content: [...]}` shape the model sees, and mapping any
/// transport/protocol failure into an error-flagged [`ToolResult`] rather
/// than propagating — a failing tool call terminates a turn via the loop's
/// own failure-counting, not via a propagated error.
pub async fn execute_tool_call(client: &dyn McpClient, call: &ToolCall) -> ToolResult {
    match client.call_tool(&call.name, call.arguments.clone()).await {
        Ok(items) => {
            let wrapped = serde_json::json!({ "tool_output_content": items });
            ToolResult {
                tool_call_id: call.id.clone(),
                content: serde_json::to_string(&wrapped).unwrap_or_default(),
                is_error: false,
            }
        }
        Err(err) => ToolResult {
            tool_call_id: call.id.clone(),
            content: err.to_string(),
            is_error: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct EchoClient {
        tools: Vec<McpToolDescriptor>,
        fail_next: Mutex<bool>,
    }

    #[async_trait]
    impl McpClient for EchoClient {
        async fn list_tools(&self) -> Result<Vec<McpToolDescriptor>, McpError> {
            Ok(self.tools.clone())
        }

        async fn call_tool(
            &self,
            name: &str,
            arguments: serde_json::Value,
        ) -> Result<Vec<McpContentItem>, McpError> {
            if *self.fail_next.lock().unwrap() {
                return Err(McpError::ToolError {
                    code: 1,
                    message: "boom".to_string(),
                    data: None,
                });
            }
            Ok(vec![McpContentItem::Text {
                text: format!("{name}:{arguments}"),
            }])
        }
    }

    #[tokio::test]
    async fn successful_call_wraps_content() {
        let client = EchoClient {
            tools: vec![],
            fail_next: Mutex::new(false),
        };
        let call = ToolCall {
            id: "1".to_string(),
            name: "list_processors".to_string(),
            arguments: serde_json::json!({}),
        };
        let result = execute_tool_call(&client, &call).await;
        assert!(!result.is_error);
        assert!(result.content.contains("tool_output_content"));
    }

    #[tokio::test]
    async fn failing_call_becomes_error_result_not_panic() {
        let client = EchoClient {
            tools: vec![],
            fail_next: Mutex::new(true),
        };
        let call = ToolCall {
            id: "1".to_string(),
            name: "list_processors".to_string(),
            arguments: serde_json::json!({}),
        };
        let result = execute_tool_call(&client, &call).await;
        assert!(result.is_error);
        assert!(result.content.contains("boom"));
    }
}
