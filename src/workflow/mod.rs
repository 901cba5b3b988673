//! Workflow runtime: a graph of [`node::Node`]/[`node::AsyncNode`]
//! steps strung together by successor edges, run by an
//! [`executor::AsyncWorkflowExecutor`] and looked up by name through a
//! [`registry::WorkflowRegistry`].

pub mod executor;
pub mod node;
pub mod registry;

pub use executor::{AsyncWorkflowEventHandler, AsyncWorkflowExecutor, WorkflowKind, WorkflowResult, WorkflowStatus};
pub use node::{AsyncFlowGraph, AsyncNode, Node, Shared, SyncFlow, DEFAULT_ACTION};
pub use registry::{RegistryError, WorkflowDefinition, WorkflowFactory, WorkflowRegistry};
