//! Agent execution engine.
//!
//! Bottom-up: [`ReasoningLoop`] drives one agent, [`DelegationCoordinator`]
//! chains loops across handoffs, [`IsolatedRunner`] puts a deadline around a
//! coordinated run, and [`AgentTeam`] turns all of it into a [`TaskResult`].

mod config;
mod context;
mod coordinator;
mod definition;
mod events;
mod execution;
mod runner;
mod state;
mod task;

pub use config::{
    DEFAULT_MAX_HANDOFFS, DEFAULT_MAX_ITERATIONS, DEFAULT_TEARDOWN_GRACE, DEFAULT_TEMPERATURE,
    DEFAULT_TIMEOUT, ExecutionConfig,
};
pub use context::ConversationState;
pub use coordinator::{DelegationCoordinator, RunOutput};
pub use definition::{AgentDefinition, AgentGraph, AgentGraphBuilder, AgentId};
pub use events::{EventSink, StepEvent};
pub use execution::{LoopExit, LoopOutcome, ReasoningLoop};
pub use runner::{IsolatedRunner, RunnerError, WorkerScope};
pub use state::{
    ErrorKind, ExecutionLog, RunStatus, StepError, StepRecord, TaskMetrics, ToolCallTrace,
    ToolStats,
};
pub use task::{AgentTeam, TaskContext, TaskResult, TaskStatus};
