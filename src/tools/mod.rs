//! In-repo tools exercised by the executor and loop in tests without a real
//! MCP server: a shell-command tool and a text-editor tool. These stand in
//! for "the NiFi tool catalog" locally; production tool catalogs arrive over
//! the [`crate::mcp::McpClient`] trait instead.

pub mod bash;
pub mod editor_edit;

pub use bash::BashTool;
pub use editor_edit::EditorEditTool;

use crate::llm::ToolCall;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, `Send` future — used instead of `#[async_trait]` so `ToolProvider`
/// stays dyn-compatible without forcing every implementor into the macro.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A tool the registry can list to an LLM and invoke by name.
pub trait ToolProvider: Send + Sync {
    /// Stable name the LLM sees and uses in `ToolCall.name`.
    fn name(&self) -> &str;

    /// Short description shown to the LLM by default.
    fn brief(&self) -> &str;

    /// Full usage details; falls back to `brief()` when a provider has
    /// nothing more to add.
    fn full_description(&self) -> String {
        self.brief().to_string()
    }

    /// JSON-Schema for this tool's arguments.
    fn parameters(&self) -> serde_json::Value;

    /// Run the tool. `Ok` becomes a successful `ToolResult`, `Err` an
    /// error-flagged one; the registry never panics on a tool failure.
    fn execute<'a>(&'a self, call: &'a ToolCall) -> BoxFuture<'a, Result<String, String>>;
}

impl ToolProvider for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn brief(&self) -> &str {
        "Execute a shell command and return the output."
    }

    fn full_description(&self) -> String {
        self.as_tool().description
    }

    fn parameters(&self) -> serde_json::Value {
        self.as_tool().parameters
    }

    fn execute<'a>(&'a self, call: &'a ToolCall) -> BoxFuture<'a, Result<String, String>> {
        Box::pin(async move { BashTool::execute(self, call).await })
    }
}

/// The full set of locally-implemented tools, used by
/// [`crate::llm::ToolRegistry::register_all_builtin`].
pub fn all_tools() -> Vec<Arc<dyn ToolProvider>> {
    vec![Arc::new(BashTool::new()), Arc::new(EditorEditTool::new())]
}
