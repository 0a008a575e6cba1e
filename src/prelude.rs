//! Prelude module for convenient imports.
//!
//! ```rust
//! use agent_relay::prelude::*;
//! ```

// Core types
pub use crate::Error;
pub use crate::Result;

// Agents
pub use crate::agent::{
    AgentDefinition, AgentGraph, AgentId, AgentTeam, ExecutionConfig, TaskContext, TaskResult,
    TaskStatus,
};

// Completion
pub use crate::client::{CompletionResponse, CompletionService, OpenAiClient, ScriptedCompletion};

// Tools
pub use crate::tools::{FnTool, Tool, ToolRegistry, TypedTool};
pub use crate::types::{ToolCallRequest, ToolError};
