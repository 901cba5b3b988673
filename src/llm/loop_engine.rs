//! Iteration loop: the turn-taking state machine between the
//! model and tool calls.
//!
//! Grounded in the loop's pseudocode: clean the incoming history, then
//! repeatedly normalize tools, prune context, dispatch to the model, and —
//! if the model asked for tools — execute them and append results, tracking
//! consecutive all-tool-call failures as a termination condition distinct
//! from a fatal dispatch error.

use super::clean;
use super::dispatcher::Dispatcher;
use super::pruner;
use super::{Message, ProviderKind, Tool, ToolCall};
use crate::mcp::{execute_tool_call, McpClient};

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    TaskComplete,
    MaxIterations,
    FatalError,
    ConsecutiveToolFailures,
    UserStopped,
}

/// The loop's full result: the new message tail, counters, and why it ended.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub messages: Vec<Message>,
    pub loop_count: u32,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub termination_reason: TerminationReason,
    pub last_error: Option<String>,
}

/// Everything the loop needs to run one user turn. `workflow_id`/`step_id`
/// are only set when running under the workflow runtime; when absent,
/// action ids are minted without the `wf-` prefix.
pub struct LoopRequest<'a> {
    pub provider: ProviderKind,
    pub model: String,
    pub system_prompt: String,
    pub initial_messages: Vec<Message>,
    pub tool_catalog: Vec<Tool>,
    pub max_iterations: u32,
    pub token_budget: u32,
    pub workflow_id: Option<String>,
    pub step_id: Option<String>,
    pub stop_requested: &'a dyn Fn() -> bool,
}

fn mint_action_id(workflow_id: &Option<String>, step_id: &Option<String>, kind: &str) -> String {
    match (workflow_id, step_id) {
        (Some(wf), Some(step)) => format!("wf-{wf}-{step}-{kind}-{}", uuid::Uuid::new_v4()),
        _ => format!("{kind}-{}", uuid::Uuid::new_v4()),
    }
}

fn parse_tool_arguments(call: &ToolCall) -> serde_json::Value {
    if call.arguments.is_null() {
        serde_json::json!({})
    } else {
        call.arguments.clone()
    }
}

/// Run the loop to completion for one user turn.
pub async fn run_loop(
    dispatcher: &Dispatcher,
    mcp_client: &dyn McpClient,
    request: LoopRequest<'_>,
) -> LoopOutcome {
    let mut messages = clean::clean(request.initial_messages.clone());
    let mut loop_count = 0u32;
    let mut consecutive_failures = 0u32;
    let mut tokens_in = 0u32;
    let mut tokens_out = 0u32;

    let termination = loop {
        if (request.stop_requested)() {
            break TerminationReason::UserStopped;
        }
        if loop_count >= request.max_iterations {
            break TerminationReason::MaxIterations;
        }
        loop_count += 1;

        // Tool-schema normalization happens at the adapter boundary
        // (`dispatch` calls `normalizer::normalize` per provider dialect);
        // the pruner and dispatcher both work off the canonical catalog.
        let tools = request.tool_catalog.clone();
        let pruned = pruner::prune(
            messages.clone(),
            request.token_budget,
            request.provider,
            &request.model,
            &tools,
        );

        let action_id = mint_action_id(&request.workflow_id, &request.step_id, "llm");

        let resp = dispatcher
            .dispatch(
                request.provider,
                &request.model,
                Some(&request.system_prompt),
                &pruned,
                &tools,
            )
            .await;

        let resp = match resp {
            Ok(resp) => resp,
            Err(err) => {
                return LoopOutcome {
                    messages,
                    loop_count,
                    tokens_in,
                    tokens_out,
                    termination_reason: TerminationReason::FatalError,
                    last_error: Some(err.to_string()),
                };
            }
        };

        tokens_in += resp.tokens_in;
        tokens_out += resp.tokens_out;

        let content = resp.content.clone().unwrap_or_default();
        let tool_calls = resp.tool_calls.clone().unwrap_or_default();

        if tool_calls.is_empty() {
            let mut done = Message::assistant(content);
            done.action_id = Some(action_id);
            done.workflow_id = request.workflow_id.clone();
            done.step_id = request.step_id.clone();
            messages.push(done);
            break TerminationReason::TaskComplete;
        }

        let mut assistant_msg = Message::assistant_tool_calls(content, tool_calls.clone());
        assistant_msg.action_id = Some(action_id);
        assistant_msg.workflow_id = request.workflow_id.clone();
        assistant_msg.step_id = request.step_id.clone();
        messages.push(assistant_msg);

        let mut failed = 0usize;
        for tc in &tool_calls {
            let mut call = tc.clone();
            call.arguments = parse_tool_arguments(tc);
            let tool_action_id = mint_action_id(&request.workflow_id, &request.step_id, "tool");

            let result = execute_tool_call(mcp_client, &call).await;
            if result.is_error {
                failed += 1;
            }
            let mut tool_msg = Message::tool_result(result.tool_call_id, result.content);
            tool_msg.action_id = Some(tool_action_id);
            tool_msg.workflow_id = request.workflow_id.clone();
            tool_msg.step_id = request.step_id.clone();
            messages.push(tool_msg);
        }

        if failed == tool_calls.len() {
            consecutive_failures += 1;
            if consecutive_failures >= 3 {
                break TerminationReason::ConsecutiveToolFailures;
            }
        } else {
            consecutive_failures = 0;
        }
    };

    let mut outcome = LoopOutcome {
        messages,
        loop_count,
        tokens_in,
        tokens_out,
        termination_reason: termination,
        last_error: None,
    };

    if termination == TerminationReason::MaxIterations {
        issue_status_report(dispatcher, &request, &mut outcome).await;
    }

    outcome
}

/// On `max_iterations`, make one best-effort, tool-free call asking the
/// model to summarize where it left off. Any failure here is swallowed —
/// the loop already has an outcome to return.
async fn issue_status_report(dispatcher: &Dispatcher, request: &LoopRequest<'_>, outcome: &mut LoopOutcome) {
    const STATUS_PROMPT: &str =
        "Iteration limit reached. In one or two sentences, summarize what has been done so far and what remains.";

    let mut history = outcome.messages.clone();
    history.push(Message::user(STATUS_PROMPT));

    if let Ok(resp) = dispatcher
        .dispatch(request.provider, &request.model, Some(&request.system_prompt), &history, &[])
        .await
    {
        if let Some(content) = resp.content {
            outcome.tokens_in += resp.tokens_in;
            outcome.tokens_out += resp.tokens_out;
            let mut status_message = Message::assistant(content);
            status_message.name = Some("status_report".to_string());
            outcome.messages.push(status_message);
        }
    }
}
