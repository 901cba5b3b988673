// LLM Provider Module
// Provides a unified interface for multiple LLM providers

pub mod adapters;
pub mod clean;
pub mod dispatcher;
pub mod loop_engine;
pub mod normalizer;
pub mod pruner;
pub mod provider;
pub mod registry;
pub mod tokenizer;

// Re-export main types
pub use dispatcher::{dispatch, Dispatcher};
pub use loop_engine::{run_loop, LoopOutcome, TerminationReason};
pub use provider::*;
pub use registry::ToolRegistry;
