//! Workflow registry: maps workflow names to definitions and
//! builds an executor on demand, rejecting a sync/async mismatch rather than
//! silently coercing one kind of flow into the other.

use super::executor::{AsyncWorkflowExecutor, WorkflowKind};
use super::node::{AsyncFlowGraph, SyncFlow};
use crate::events::EventBus;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a fresh [`WorkflowKind`] each time the workflow runs — flows carry
/// mutable-ish state (`successors` maps are fixed, but nothing prevents a
/// node from being stateful), so definitions hold a factory, not an instance.
pub type WorkflowFactory = Arc<dyn Fn() -> WorkflowKind + Send + Sync>;

#[derive(Clone)]
pub struct WorkflowDefinition {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub category: String,
    pub phases: Vec<String>,
    pub is_async: bool,
    pub enabled: bool,
    pub factory: WorkflowFactory,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("workflow '{0}' is not registered")]
    NotFound(String),
    #[error("workflow '{0}' is disabled by configuration")]
    Disabled(String),
    #[error("workflow '{name}' is_async={actual} but an is_async={requested} executor was requested")]
    KindMismatch { name: String, actual: bool, requested: bool },
}

pub struct WorkflowRegistry {
    definitions: HashMap<String, WorkflowDefinition>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self {
            definitions: HashMap::new(),
        }
    }

    pub fn register(&mut self, definition: WorkflowDefinition) {
        self.definitions.insert(definition.name.clone(), definition);
    }

    /// Disable a registered workflow by name (e.g. per `workflows.enabled`
    /// configuration); absent names are a no-op.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) {
        if let Some(def) = self.definitions.get_mut(name) {
            def.enabled = enabled;
        }
    }

    pub fn get(&self, name: &str) -> Option<&WorkflowDefinition> {
        self.definitions.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.definitions.keys().map(|s| s.as_str()).collect()
    }

    /// Build an executor for `name`, regardless of whether its flow is sync
    /// or async — `AsyncWorkflowExecutor` handles both.
    pub fn create_executor(
        &self,
        name: &str,
        event_bus: Arc<EventBus>,
    ) -> Result<AsyncWorkflowExecutor, RegistryError> {
        let def = self
            .definitions
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        if !def.enabled {
            return Err(RegistryError::Disabled(name.to_string()));
        }
        Ok(AsyncWorkflowExecutor::new(def.name.clone(), (def.factory)(), event_bus))
    }

    /// Build an executor, rejecting the request outright if the workflow's
    /// declared `is_async` doesn't match what the caller expects.
    pub fn create_executor_expecting(
        &self,
        name: &str,
        expect_async: bool,
        event_bus: Arc<EventBus>,
    ) -> Result<AsyncWorkflowExecutor, RegistryError> {
        let def = self
            .definitions
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        if !def.enabled {
            return Err(RegistryError::Disabled(name.to_string()));
        }
        if def.is_async != expect_async {
            return Err(RegistryError::KindMismatch {
                name: name.to_string(),
                actual: def.is_async,
                requested: expect_async,
            });
        }
        Ok(AsyncWorkflowExecutor::new(def.name.clone(), (def.factory)(), event_bus))
    }
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience for building a sync-flow factory from a single start node.
pub fn sync_workflow(start: Arc<dyn super::node::Node>) -> WorkflowFactory {
    Arc::new(move || WorkflowKind::Sync(SyncFlow::new(start.clone())))
}

/// Convenience for building an async-flow factory from a single start node.
pub fn async_workflow(start: Arc<dyn super::node::AsyncNode>) -> WorkflowFactory {
    Arc::new(move || WorkflowKind::Async(AsyncFlowGraph::new(start.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::node::Node;
    use std::collections::HashMap as StdHashMap;

    struct Noop {
        successors: StdHashMap<String, Arc<dyn Node>>,
    }

    impl Node for Noop {
        fn successors(&self) -> &StdHashMap<String, Arc<dyn Node>> {
            &self.successors
        }
    }

    fn sample_definition(enabled: bool) -> WorkflowDefinition {
        let node: Arc<dyn Node> = Arc::new(Noop {
            successors: StdHashMap::new(),
        });
        WorkflowDefinition {
            name: "sample".to_string(),
            display_name: "Sample".to_string(),
            description: "a test workflow".to_string(),
            category: "test".to_string(),
            phases: vec!["run".to_string()],
            is_async: false,
            enabled,
            factory: sync_workflow(node),
        }
    }

    #[test]
    fn unknown_workflow_is_not_found() {
        let registry = WorkflowRegistry::new();
        let bus = Arc::new(EventBus::new());
        let err = registry.create_executor("missing", bus).unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[test]
    fn disabled_workflow_is_rejected() {
        let mut registry = WorkflowRegistry::new();
        registry.register(sample_definition(false));
        let bus = Arc::new(EventBus::new());
        let err = registry.create_executor("sample", bus).unwrap_err();
        assert!(matches!(err, RegistryError::Disabled(_)));
    }

    #[test]
    fn async_request_against_a_sync_workflow_is_a_kind_mismatch() {
        let mut registry = WorkflowRegistry::new();
        registry.register(sample_definition(true));
        let bus = Arc::new(EventBus::new());
        let err = registry
            .create_executor_expecting("sample", true, bus)
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::KindMismatch {
                actual: false,
                requested: true,
                ..
            }
        ));
    }
}
