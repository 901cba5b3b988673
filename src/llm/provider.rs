use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Message Types
// ============================================================================

/// Message role in conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Message in conversation history
///
/// This is the canonical, provider-independent message representation used
/// throughout the dispatcher, normalizer, pruner and iteration loop. Provider
/// adapters translate to and from their own wire formats at the boundary;
/// nothing outside an adapter should depend on a provider-specific shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,

    /// Tool call ID (for tool responses)
    #[serde(default)]
    pub tool_call_id: Option<String>,

    /// Tool calls made by assistant
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Name of the tool that produced a `tool` message (provider-dependent, optional)
    #[serde(default)]
    pub name: Option<String>,

    /// Opaque id correlating a `user` message to its originating request
    #[serde(default)]
    pub user_request_id: Option<String>,

    /// Input tokens attributed to this assistant turn
    #[serde(default)]
    pub token_count_in: Option<u32>,

    /// Output tokens attributed to this assistant turn
    #[serde(default)]
    pub token_count_out: Option<u32>,

    /// Correlates this message to a single model/tool call for logs and UI
    #[serde(default)]
    pub action_id: Option<String>,

    /// Set when this message was produced under the workflow runtime
    #[serde(default)]
    pub workflow_id: Option<String>,

    /// Set when this message was produced under a specific workflow step
    #[serde(default)]
    pub step_id: Option<String>,
}

impl Default for Message {
    fn default() -> Self {
        Self {
            role: Role::User,
            content: String::new(),
            tool_call_id: None,
            tool_calls: None,
            name: None,
            user_request_id: None,
            token_count_in: None,
            token_count_out: None,
            action_id: None,
            workflow_id: None,
            step_id: None,
        }
    }
}

impl Message {
    /// Construct a `system` message (at most one should appear, at position 0).
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            ..Default::default()
        }
    }

    /// Construct a `user` message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            ..Default::default()
        }
    }

    /// Construct an `assistant` message with plain text content.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            ..Default::default()
        }
    }

    /// Construct an `assistant` message requesting tool calls.
    pub fn assistant_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Some(tool_calls),
            ..Default::default()
        }
    }

    /// Construct a `tool` message carrying a JSON-encoded result.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
            ..Default::default()
        }
    }

    /// True for an assistant message carrying at least one tool call.
    pub fn has_unresolved_tool_calls(&self) -> bool {
        matches!(self.role, Role::Assistant) && self.tool_calls.as_ref().is_some_and(|c| !c.is_empty())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            Role::System => write!(f, "System: {}", self.content),
            Role::User => write!(f, "User: {}", self.content),
            Role::Assistant => write!(f, "Assistant: {}", self.content),
            Role::Tool => write!(f, "Tool: {}", self.content),
        }
    }
}

/// Tool call made by the LLM
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

// ============================================================================
// Tool Definition and Results
// ============================================================================

/// Tool definition for function calling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value, // JSON Schema

    /// Full detailed description (not serialized to LLM)
    ///
    /// When set, `description` is used as the brief description,
    /// and this field contains the full usage details.
    /// Use `get_full_description()` to retrieve the appropriate description.
    #[serde(skip_serializing, default)]
    pub full_description: Option<String>,
}

impl Tool {
    /// Create a new tool with brief and full descriptions
    pub fn new(
        name: impl Into<String>,
        brief: impl Into<String>,
        full_description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: brief.into(),
            parameters,
            full_description: Some(full_description.into()),
        }
    }

    /// Get the full description (falls back to brief if not set)
    pub fn get_full_description(&self) -> &str {
        self.full_description
            .as_deref()
            .unwrap_or(&self.description)
    }

    /// Create a brief version for sending to LLM (strips full_description)
    pub fn as_brief(&self) -> Tool {
        Tool {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
            full_description: None,
        }
    }
}

/// Tool execution result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Must match the tool_call_id from ToolCall
    pub tool_call_id: String,

    /// Result content (can be string, JSON, or error message)
    pub content: String,

    /// Whether the tool execution was successful
    pub is_error: bool,
}

// ============================================================================
// Response Types
// ============================================================================

/// Uniform response surfaced by the dispatcher for a single,
/// non-streaming model call: `dispatch(provider, model, messages, tools) →
/// DispatchResponse`.
#[derive(Debug, Clone, Default)]
pub struct DispatchResponse {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub tokens_in: u32,
    pub tokens_out: u32,
}

impl DispatchResponse {
    pub fn tool_calls_requested(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Provider error types
///
/// One variant per row of the error-kind table: each maps to an [`ErrorKind`]
/// the iteration loop can match on without inspecting provider-specific
/// strings. The human-readable `Display` text is preserved for logs.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Quota exceeded")]
    QuotaExceeded,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Malformed function call (suspect tools: {tool_names:?})")]
    MalformedFunctionCall { tool_names: Vec<String> },

    #[error("Blocked by provider safety filter")]
    SafetyBlocked,

    #[error("Response truncated at max tokens")]
    MaxTokensReached,

    #[error("Request timed out")]
    Timeout,

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// The taxonomy the iteration loop actually inspects; distinct from the
/// human string, which is preserved only for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Auth,
    Quota,
    RateLimit,
    ModelNotFound,
    BadRequest,
    MalformedFunctionCall,
    SafetyBlocked,
    MaxTokens,
    Transport,
    Timeout,
    Unknown,
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::AuthenticationFailed => ErrorKind::Auth,
            ProviderError::QuotaExceeded => ErrorKind::Quota,
            ProviderError::RateLimitExceeded => ErrorKind::RateLimit,
            ProviderError::ModelNotFound(_) => ErrorKind::ModelNotFound,
            ProviderError::MalformedFunctionCall { .. } => ErrorKind::MalformedFunctionCall,
            ProviderError::SafetyBlocked => ErrorKind::SafetyBlocked,
            ProviderError::MaxTokensReached => ErrorKind::MaxTokens,
            ProviderError::Timeout => ErrorKind::Timeout,
            ProviderError::NetworkError(_) => ErrorKind::Transport,
            ProviderError::ConfigError(_) => ErrorKind::BadRequest,
            _ => ErrorKind::Unknown,
        }
    }
}

/// The four supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Gemini,
    Perplexity,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Perplexity => "perplexity",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Some(ProviderKind::OpenAi),
            "anthropic" => Some(ProviderKind::Anthropic),
            "gemini" => Some(ProviderKind::Gemini),
            "perplexity" => Some(ProviderKind::Perplexity),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
