//! # agent-relay
//!
//! Execution engine for tool-using LLM agents.
//!
//! - a bounded ReAct reasoning loop (ask the model, run tools, feed back observations),
//! - delegation between agents through handoff tool calls,
//! - isolated task runs with a hard timeout that still return the partial log,
//! - approximate per-step cost telemetry.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use agent_relay::{AgentDefinition, AgentGraph, AgentTeam, OpenAiClient, ToolRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), agent_relay::Error> {
//!     let mut graph = AgentGraph::builder();
//!     let assistant = graph.add(
//!         AgentDefinition::new("Assistant", "You are a helpful assistant. Use tools when useful.")
//!             .with_tools(ToolRegistry::demo_tools()),
//!     );
//!     let graph = Arc::new(graph.build()?);
//!
//!     let team = AgentTeam::new(graph, Arc::new(OpenAiClient::from_env()?));
//!     let result = team
//!         .run_agent_task(assistant, "What is 2^10 + 5?", 5, Duration::from_secs(60))
//!         .await;
//!
//!     println!("{:?}: {:?}", result.status, result.final_answer);
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod agent;
pub mod budget;
pub mod client;
pub mod config;
pub mod observability;
pub mod prelude;
pub mod tools;
pub mod types;

pub use agent::{
    AgentDefinition, AgentGraph, AgentGraphBuilder, AgentId, AgentTeam, ConversationState,
    DelegationCoordinator, ErrorKind, EventSink, ExecutionConfig, ExecutionLog, IsolatedRunner,
    LoopExit, LoopOutcome, ReasoningLoop, RunOutput, RunStatus, RunnerError, StepError,
    StepEvent, StepRecord, TaskContext, TaskMetrics, TaskResult, TaskStatus, ToolCallTrace,
    WorkerScope,
};
pub use budget::{CostEstimate, CostSummary, ModelPricing, PricingTable, estimate_tokens};
pub use client::{
    CompletionError, CompletionRequest, CompletionResponse, CompletionService, OpenAiClient,
    ScriptStep, ScriptedCompletion, ToolChoice,
};
pub use config::{ConfigError, Settings};
pub use tools::{Dispatcher, FnTool, Tool, ToolRegistry, TypedTool};
pub use types::{Message, Observation, Role, ToolCallRequest, ToolDefinition, ToolError};

/// Error type for agent-relay operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A tool with this name is already registered.
    #[error("Tool '{name}' is already registered")]
    DuplicateTool { name: String },

    /// Agent id or name does not exist in the graph.
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    /// Invalid agent graph, tool set or runtime configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Delegation chain exceeded the configured hop count.
    #[error("Handoff limit exceeded: more than {limit} handoffs in one task")]
    TooManyHandoffs { limit: usize },

    /// Completion service call failed.
    #[error("Completion failed: {0}")]
    Completion(#[from] client::CompletionError),

    /// Work was cancelled before it finished.
    #[error("Operation cancelled")]
    Cancelled,

    /// Settings could not be loaded.
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),
}

/// Error category for unified error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Credentials rejected by the completion service
    Authorization,
    /// Graph, tool or settings problems detected at setup
    Configuration,
    /// Network or server errors that may succeed on retry
    Transient,
    /// Handoff limit or cancellation
    ResourceLimit,
    /// Everything else
    Internal,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Completion(client::CompletionError::Auth(_)) => ErrorCategory::Authorization,
            Error::Completion(e) if e.is_retryable() => ErrorCategory::Transient,

            Error::DuplicateTool { .. }
            | Error::UnknownAgent(_)
            | Error::Config(_)
            | Error::Settings(_) => ErrorCategory::Configuration,

            Error::TooManyHandoffs { .. } | Error::Cancelled => ErrorCategory::ResourceLimit,

            Error::Completion(_) => ErrorCategory::Internal,
        }
    }

    /// Stable machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::DuplicateTool { .. } => "duplicate_tool",
            Error::UnknownAgent(_) => "unknown_agent",
            Error::Config(_) => "config",
            Error::TooManyHandoffs { .. } => "too_many_handoffs",
            Error::Completion(_) => "completion",
            Error::Cancelled => "cancelled",
            Error::Settings(_) => "settings",
        }
    }

    pub fn is_configuration_error(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    pub fn is_resource_limit(&self) -> bool {
        self.category() == ErrorCategory::ResourceLimit
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }
}

/// Result type alias for agent-relay operations.
pub type Result<T> = std::result::Result<T, Error>;
