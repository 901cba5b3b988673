//! Workflow nodes: the `prep`/`exec`/`post` three-phase
//! contract and the successor-edge graph that strings nodes into a flow.
//!
//! Grounded in the PocketFlow-style node used by the original workflow
//! graph: each node reads from shared state, does its work, writes back,
//! and names the edge to follow next; a label absent from `successors`
//! ends the flow.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Mutable state threaded through an entire flow run.
pub type Shared = HashMap<String, Value>;

/// The edge a node returns from `post` when none of its declared labels
/// apply, or that a terminal node always returns.
pub const DEFAULT_ACTION: &str = "default";

/// A synchronous workflow node.
pub trait Node: Send + Sync {
    fn prep(&self, shared: &Shared) -> Value {
        let _ = shared;
        Value::Null
    }

    fn exec(&self, prep_res: Value) -> Value {
        prep_res
    }

    fn post(&self, shared: &mut Shared, prep_res: Value, exec_res: Value) -> String {
        let _ = (shared, prep_res, exec_res);
        DEFAULT_ACTION.to_string()
    }

    /// Edges out of this node, keyed by the action label `post` returns.
    fn successors(&self) -> &HashMap<String, Arc<dyn Node>>;
}

/// An async workflow node — the same three phases, but `exec` (and, when a
/// node needs to await I/O while writing back, `post`) may suspend.
#[async_trait]
pub trait AsyncNode: Send + Sync {
    async fn prep(&self, shared: &Shared) -> Value {
        let _ = shared;
        Value::Null
    }

    async fn exec(&self, prep_res: Value) -> Value {
        prep_res
    }

    async fn post(&self, shared: &mut Shared, prep_res: Value, exec_res: Value) -> String {
        let _ = (shared, prep_res, exec_res);
        DEFAULT_ACTION.to_string()
    }

    fn successors(&self) -> &HashMap<String, Arc<dyn AsyncNode>>;
}

/// A chain of sync nodes, starting at `start`, followed by successor edge
/// until a node returns a label with no matching successor.
pub struct SyncFlow {
    pub start: Arc<dyn Node>,
}

impl SyncFlow {
    pub fn new(start: Arc<dyn Node>) -> Self {
        Self { start }
    }

    pub fn run(&self, shared: &mut Shared) -> String {
        let mut current = self.start.clone();
        loop {
            let prep_res = current.prep(shared);
            let exec_res = current.exec(prep_res.clone());
            let action = current.post(shared, prep_res, exec_res);
            match current.successors().get(&action) {
                Some(next) => current = next.clone(),
                None => return action,
            }
        }
    }
}

/// The async counterpart of [`SyncFlow`].
pub struct AsyncFlowGraph {
    pub start: Arc<dyn AsyncNode>,
}

impl AsyncFlowGraph {
    pub fn new(start: Arc<dyn AsyncNode>) -> Self {
        Self { start }
    }

    pub async fn run_async(&self, shared: &mut Shared) -> String {
        let mut current = self.start.clone();
        loop {
            let prep_res = current.prep(shared).await;
            let exec_res = current.exec(prep_res.clone()).await;
            let action = current.post(shared, prep_res, exec_res).await;
            match current.successors().get(&action) {
                Some(next) => current = next.clone(),
                None => return action,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Increment {
        successors: HashMap<String, Arc<dyn Node>>,
    }

    impl Node for Increment {
        fn exec(&self, prep_res: Value) -> Value {
            let n = prep_res.as_i64().unwrap_or(0) + 1;
            Value::from(n)
        }

        fn prep(&self, shared: &Shared) -> Value {
            shared.get("count").cloned().unwrap_or(Value::from(0))
        }

        fn post(&self, shared: &mut Shared, _prep_res: Value, exec_res: Value) -> String {
            shared.insert("count".to_string(), exec_res.clone());
            if exec_res.as_i64().unwrap_or(0) >= 3 {
                "done".to_string()
            } else {
                DEFAULT_ACTION.to_string()
            }
        }

        fn successors(&self) -> &HashMap<String, Arc<dyn Node>> {
            &self.successors
        }
    }

    #[test]
    fn sync_flow_follows_successor_chain_to_a_terminal_label() {
        let third = Arc::new(Increment {
            successors: HashMap::new(),
        });
        let mut second_successors: HashMap<String, Arc<dyn Node>> = HashMap::new();
        second_successors.insert(DEFAULT_ACTION.to_string(), third);
        let second = Arc::new(Increment {
            successors: second_successors,
        });
        let mut first_successors: HashMap<String, Arc<dyn Node>> = HashMap::new();
        first_successors.insert(DEFAULT_ACTION.to_string(), second);
        let first = Arc::new(Increment {
            successors: first_successors,
        });

        let flow = SyncFlow::new(first);
        let mut shared = Shared::new();
        let action = flow.run(&mut shared);
        assert_eq!(action, "done");
        assert_eq!(shared.get("count").unwrap().as_i64().unwrap(), 3);
    }
}
