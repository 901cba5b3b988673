use clap::Parser;
use nifi_agent_runtime::config::{Cli, Commands, EngineConfig};
use nifi_agent_runtime::llm::dispatcher::{Dispatcher, ProviderSettings};
use nifi_agent_runtime::llm::loop_engine::{run_loop, LoopRequest, TerminationReason};
use nifi_agent_runtime::llm::{Message, ToolRegistry};
use nifi_agent_runtime::mcp::{McpClient, McpContentItem, McpError, McpToolDescriptor};
use nifi_agent_runtime::tools::ToolProvider;

/// Bridges the in-repo `ToolRegistry` (bash, editor) to the `McpClient`
/// contract, so a single agent turn can be run from the CLI without a real
/// MCP server wired up. Production deployments supply a real transport.
struct LocalToolsMcpClient {
    registry: ToolRegistry,
}

#[async_trait::async_trait]
impl McpClient for LocalToolsMcpClient {
    async fn list_tools(&self) -> Result<Vec<McpToolDescriptor>, McpError> {
        Ok(self
            .registry
            .get_tools_for_llm()
            .into_iter()
            .map(|tool| McpToolDescriptor {
                name: tool.name,
                description: tool.description,
                input_schema: tool.parameters,
            })
            .collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<Vec<McpContentItem>, McpError> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| McpError::MethodNotFound(name.to_string()))?;
        let call = nifi_agent_runtime::llm::ToolCall {
            id: "local".to_string(),
            name: name.to_string(),
            arguments,
        };
        match ToolProvider::execute(tool.as_ref(), &call).await {
            Ok(output) => Ok(vec![McpContentItem::Text { text: output }]),
            Err(error) => Err(McpError::ToolError {
                code: 1,
                message: error,
                data: None,
            }),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let config = EngineConfig::load(&cli);

    match &cli.command {
        Commands::Run(run_args) => {
            let provider_config = config.providers.get(&run_args.provider);
            let api_key = provider_config.and_then(|p| p.api_key.clone());
            let allowed_models = provider_config.map(|p| p.models.clone()).unwrap_or_default();

            let mut dispatcher = Dispatcher::new();
            dispatcher.configure(
                run_args.provider,
                ProviderSettings {
                    api_key,
                    base_url_override: None,
                    allowed_models,
                },
            );

            let mcp_client = LocalToolsMcpClient {
                registry: ToolRegistry::new().register_all_builtin(),
            };
            let tool_catalog = mcp_client.registry.get_tools_for_llm();

            let request = LoopRequest {
                provider: run_args.provider,
                model: run_args.model.clone(),
                system_prompt: run_args.system.clone(),
                initial_messages: vec![Message::user(run_args.message.clone())],
                tool_catalog,
                max_iterations: config.max_iterations_default,
                token_budget: config.token_budget_default,
                workflow_id: None,
                step_id: None,
                stop_requested: &|| false,
            };

            let outcome = run_loop(&dispatcher, &mcp_client, request).await;

            for message in &outcome.messages {
                println!("{message}");
            }

            log::info!(
                "turn finished: {:?} after {} iteration(s), {} in / {} out tokens",
                outcome.termination_reason,
                outcome.loop_count,
                outcome.tokens_in,
                outcome.tokens_out
            );

            if let Some(err) = &outcome.last_error {
                eprintln!("error: {err}");
            }

            if matches!(
                outcome.termination_reason,
                TerminationReason::FatalError | TerminationReason::ConsecutiveToolFailures
            ) {
                std::process::exit(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_tools_client_lists_bash_and_editor() {
        let client = LocalToolsMcpClient {
            registry: ToolRegistry::new().register_all_builtin(),
        };
        let tools = client.list_tools().await.unwrap();
        assert!(tools.iter().any(|t| t.name == "bash"));
    }

    #[tokio::test]
    async fn local_tools_client_reports_unknown_tool_as_method_not_found() {
        let client = LocalToolsMcpClient {
            registry: ToolRegistry::new().register_all_builtin(),
        };
        let err = client
            .call_tool("does_not_exist", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::MethodNotFound(_)));
    }
}
