//! Workflow executors: run a sync node chain or an async flow
//! graph to completion, emitting lifecycle events, and never propagating a
//! workflow failure to the caller — it comes back as a `WorkflowResult`.
//!
//! Grounded in `AsyncWorkflowExecutor`/`AsyncWorkflowEventHandler`: a single
//! executor type dispatches to either the sync or async path depending on
//! which kind of flow it was built with, wraps the sync path in a blocking
//! task so it never stalls the async runtime, and emits
//! `workflow_start`/`workflow_complete`/`workflow_error` around the run.

use super::node::{AsyncFlowGraph, Shared, SyncFlow};
use crate::events::{event_types, Event, EventBus};
use std::sync::Arc;

/// The outcome of running a workflow to completion. Mirrors the original's
/// `{status, ...}` dict rather than a `Result`, since a failed workflow is
/// still a normal (not exceptional) return value to the caller.
#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub status: WorkflowStatus,
    pub workflow_name: String,
    pub terminal_action: Option<String>,
    pub shared_state: Shared,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStatus {
    Success,
    Error,
}

/// Either kind of flow a named workflow may be built from; a given flow is
/// all-sync or all-async, never mixed.
pub enum WorkflowKind {
    Sync(SyncFlow),
    Async(AsyncFlowGraph),
}

pub struct AsyncWorkflowExecutor {
    workflow_name: String,
    workflow: WorkflowKind,
    event_bus: Arc<EventBus>,
}

impl std::fmt::Debug for AsyncWorkflowExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncWorkflowExecutor")
            .field("workflow_name", &self.workflow_name)
            .finish_non_exhaustive()
    }
}

impl AsyncWorkflowExecutor {
    pub fn new(workflow_name: impl Into<String>, workflow: WorkflowKind, event_bus: Arc<EventBus>) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            workflow,
            event_bus,
        }
    }

    pub fn is_async_workflow(&self) -> bool {
        matches!(self.workflow, WorkflowKind::Async(_))
    }

    /// Run the workflow, emitting start/complete/error events around it.
    pub async fn execute_async(&self, initial_context: Shared) -> WorkflowResult {
        let user_request_id = initial_context
            .get("user_request_id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        let mut data = std::collections::HashMap::new();
        data.insert(
            "workflow_type".to_string(),
            serde_json::Value::from(if self.is_async_workflow() { "async" } else { "sync" }),
        );
        data.insert(
            "initial_context_keys".to_string(),
            serde_json::Value::from(initial_context.keys().cloned().collect::<Vec<_>>()),
        );
        self.event_bus
            .emit(
                event_types::WORKFLOW_START,
                self.workflow_name.clone(),
                "workflow_start",
                data,
                user_request_id.clone(),
            )
            .await;

        let mut shared = initial_context;
        shared.insert(
            "workflow_name".to_string(),
            serde_json::Value::from(self.workflow_name.clone()),
        );

        let result = match &self.workflow {
            WorkflowKind::Async(flow) => {
                let action = flow.run_async(&mut shared).await;
                WorkflowResult {
                    status: WorkflowStatus::Success,
                    workflow_name: self.workflow_name.clone(),
                    terminal_action: Some(action),
                    shared_state: shared,
                    error: None,
                }
            }
            WorkflowKind::Sync(flow) => {
                // Offload the blocking chain to a worker thread so the
                // scheduler task is never blocked by sync node work.
                let action = {
                    let mut shared_for_task = shared.clone();
                    let start = flow.start.clone();
                    tokio::task::spawn_blocking(move || {
                        let flow = SyncFlow::new(start);
                        let action = flow.run(&mut shared_for_task);
                        (action, shared_for_task)
                    })
                    .await
                };
                match action {
                    Ok((action, shared_state)) => WorkflowResult {
                        status: WorkflowStatus::Success,
                        workflow_name: self.workflow_name.clone(),
                        terminal_action: Some(action),
                        shared_state,
                        error: None,
                    },
                    Err(join_err) => WorkflowResult {
                        status: WorkflowStatus::Error,
                        workflow_name: self.workflow_name.clone(),
                        terminal_action: None,
                        shared_state: shared,
                        error: Some(join_err.to_string()),
                    },
                }
            }
        };

        let mut completion_data = std::collections::HashMap::new();
        completion_data.insert(
            "status".to_string(),
            serde_json::Value::from(match result.status {
                WorkflowStatus::Success => "success",
                WorkflowStatus::Error => "error",
            }),
        );
        if let Some(error) = &result.error {
            completion_data.insert("error".to_string(), serde_json::Value::from(error.clone()));
        }

        let event_type = match result.status {
            WorkflowStatus::Success => event_types::WORKFLOW_COMPLETE,
            WorkflowStatus::Error => event_types::WORKFLOW_ERROR,
        };
        self.event_bus
            .emit(
                event_type,
                self.workflow_name.clone(),
                "workflow_complete",
                completion_data,
                user_request_id,
            )
            .await;

        result
    }
}

/// A UI-facing callback invoked once per event the handler forwards.
pub type UiCallback = Arc<dyn Fn(Event) + Send + Sync>;

/// Subscribes to an [`EventBus`] once and fans each event out to every
/// registered UI callback, catching (and logging, not propagating) a
/// callback that panics — a stand-in for the original's try/except around
/// each forwarded call.
pub struct AsyncWorkflowEventHandler {
    callbacks: std::sync::Mutex<Vec<UiCallback>>,
}

impl AsyncWorkflowEventHandler {
    pub fn new() -> Self {
        Self {
            callbacks: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn register_ui_callback(&self, callback: UiCallback) {
        self.callbacks.lock().unwrap().push(callback);
    }

    /// Drain `bus`'s broadcast channel on the current task, forwarding every
    /// event to the registered callbacks, until the sender side is dropped.
    pub async fn run(&self, bus: &EventBus) {
        let mut receiver = bus.subscribe();
        loop {
            match receiver.recv().await {
                Ok(event) => self.dispatch(event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    fn dispatch(&self, event: Event) {
        let callbacks = self.callbacks.lock().unwrap().clone();
        for callback in callbacks {
            let event = event.clone();
            if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(event))) {
                log::error!("UI callback error: {panic:?}");
            }
        }
    }
}

impl Default for AsyncWorkflowEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::node::{AsyncNode, Node, DEFAULT_ACTION};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TerminalSync {
        successors: HashMap<String, Arc<dyn Node>>,
    }

    impl Node for TerminalSync {
        fn successors(&self) -> &HashMap<String, Arc<dyn Node>> {
            &self.successors
        }
    }

    struct TerminalAsync {
        successors: HashMap<String, Arc<dyn AsyncNode>>,
    }

    #[async_trait]
    impl AsyncNode for TerminalAsync {
        fn successors(&self) -> &HashMap<String, Arc<dyn AsyncNode>> {
            &self.successors
        }
    }

    #[tokio::test]
    async fn sync_workflow_runs_on_blocking_pool_and_emits_lifecycle_events() {
        let bus = Arc::new(EventBus::new());
        let mut history = bus.subscribe();
        let node = Arc::new(TerminalSync {
            successors: HashMap::new(),
        });
        let executor = AsyncWorkflowExecutor::new("demo", WorkflowKind::Sync(SyncFlow::new(node)), bus.clone());

        let result = executor.execute_async(Shared::new()).await;
        assert_eq!(result.status, WorkflowStatus::Success);
        assert_eq!(result.terminal_action.as_deref(), Some(DEFAULT_ACTION));

        let start = history.recv().await.unwrap();
        assert_eq!(start.event_type, event_types::WORKFLOW_START);
        let complete = history.recv().await.unwrap();
        assert_eq!(complete.event_type, event_types::WORKFLOW_COMPLETE);
    }

    #[tokio::test]
    async fn async_workflow_is_detected_and_runs_in_place() {
        let bus = Arc::new(EventBus::new());
        let node = Arc::new(TerminalAsync {
            successors: HashMap::new(),
        });
        let executor = AsyncWorkflowExecutor::new(
            "demo-async",
            WorkflowKind::Async(AsyncFlowGraph::new(node)),
            bus,
        );
        assert!(executor.is_async_workflow());
        let result = executor.execute_async(Shared::new()).await;
        assert_eq!(result.status, WorkflowStatus::Success);
    }

    #[tokio::test]
    async fn event_handler_forwards_events_to_every_registered_callback() {
        let bus = Arc::new(EventBus::new());
        let handler = Arc::new(AsyncWorkflowEventHandler::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        handler.register_ui_callback(Arc::new(move |_event| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let handler_clone = handler.clone();
        let bus_clone = bus.clone();
        let handle = tokio::spawn(async move { handler_clone.run(&bus_clone).await });

        bus.emit(event_types::MESSAGE_ADDED, "wf1", "step1", HashMap::new(), None)
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        handle.abort();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
