//! Caller-facing task API.
//!
//! [`AgentTeam::run_agent_task`] runs one task in isolation: its own worker,
//! its own [`TaskContext`], its own conversation. Whatever happens, the caller
//! gets a [`TaskResult`] to branch on; failures are data, not `Err`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{Instrument, info};

use super::config::ExecutionConfig;
use super::coordinator::{DelegationCoordinator, RunOutput};
use super::definition::{AgentGraph, AgentId};
use super::events::StepEvent;
use super::runner::{IsolatedRunner, RunnerError};
use super::state::{ErrorKind, ExecutionLog, RunStatus, StepError, TaskMetrics};
use crate::budget::{CostSummary, PricingTable};
use crate::client::CompletionService;
use crate::observability::SpanContext;

/// Status of a finished task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// The final agent answered without tool calls
    Completed,
    /// An agent ran out of iterations
    Incomplete,
    /// Completion failure, handoff limit, worker crash or invalid setup
    Failed,
    /// The task deadline passed
    TimedOut,
}

impl From<RunStatus> for TaskStatus {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Completed => Self::Completed,
            RunStatus::Incomplete => Self::Incomplete,
            RunStatus::Failed => Self::Failed,
        }
    }
}

/// Everything a caller learns about one task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub task_id: String,
    pub status: TaskStatus,
    pub final_answer: Option<String>,
    pub final_agent: Option<String>,
    pub log: ExecutionLog,
    /// `None` when no step had a known price.
    pub total_cost: Option<CostSummary>,
    pub metrics: TaskMetrics,
    pub error: Option<StepError>,
    pub elapsed_ms: u64,
}

impl TaskResult {
    fn new(task_id: String, status: TaskStatus, log: ExecutionLog, started: Instant) -> Self {
        Self {
            task_id,
            status,
            final_answer: None,
            final_agent: None,
            total_cost: log.cost_summary().into_option(),
            metrics: log.metrics(),
            log,
            error: None,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }

    fn from_output(task_id: String, output: RunOutput, started: Instant) -> Self {
        Self {
            final_answer: output.final_answer,
            final_agent: Some(output.final_agent),
            error: output.failure,
            ..Self::new(task_id, output.status.into(), output.log, started)
        }
    }

    fn from_runner_error(task_id: String, error: RunnerError, started: Instant) -> Self {
        let (status, step_error) = match &error {
            RunnerError::Timeout { .. } => (
                TaskStatus::TimedOut,
                StepError::new(ErrorKind::Timeout, error.to_string()),
            ),
            RunnerError::Fatal { kind, message, .. } => {
                (TaskStatus::Failed, StepError::new(*kind, message.clone()))
            }
        };
        let final_agent = error.log().last().map(|step| step.agent_name.clone());
        Self {
            final_agent,
            error: Some(step_error),
            ..Self::new(task_id, status, error.into_log(), started)
        }
    }

    fn rejected(task_id: String, error: &crate::Error, started: Instant) -> Self {
        Self {
            error: Some(StepError::new(ErrorKind::Fatal, error.to_string())),
            ..Self::new(task_id, TaskStatus::Failed, ExecutionLog::new(), started)
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    pub fn answer(&self) -> &str {
        self.final_answer.as_deref().unwrap_or_default()
    }
}

/// Per-task settings, passed by value into one run.
///
/// Nothing here is shared between tasks: two concurrent tasks with different
/// credentials or budgets never see each other's values.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub task_id: String,
    /// Overrides the completion service's own credential for this task.
    pub api_key: Option<SecretString>,
    pub model: Option<String>,
    pub max_iterations: Option<usize>,
    pub max_handoffs: Option<usize>,
    pub timeout: Option<Duration>,
}

impl Default for TaskContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskContext {
    pub fn new() -> Self {
        Self {
            task_id: uuid::Uuid::new_v4().to_string(),
            api_key: None,
            model: None,
            max_iterations: None,
            max_handoffs: None,
            timeout: None,
        }
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = task_id.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn with_max_handoffs(mut self, max_handoffs: usize) -> Self {
        self.max_handoffs = Some(max_handoffs);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// `base` with this context's overrides applied.
    pub fn apply(&self, base: &ExecutionConfig) -> ExecutionConfig {
        let mut config = base.clone();
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(max_iterations) = self.max_iterations {
            config.max_iterations = max_iterations;
        }
        if let Some(max_handoffs) = self.max_handoffs {
            config.max_handoffs = max_handoffs;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        config
    }
}

/// An agent graph bound to a completion service; the entry point for tasks.
#[derive(Clone)]
pub struct AgentTeam {
    graph: Arc<AgentGraph>,
    client: Arc<dyn CompletionService>,
    config: ExecutionConfig,
    pricing: Option<Arc<PricingTable>>,
}

impl AgentTeam {
    pub fn new(graph: Arc<AgentGraph>, client: Arc<dyn CompletionService>) -> Self {
        Self {
            graph,
            client,
            config: ExecutionConfig::default(),
            pricing: None,
        }
    }

    pub fn with_config(mut self, config: ExecutionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = Some(Arc::new(pricing));
        self
    }

    pub fn graph(&self) -> &AgentGraph {
        &self.graph
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Runs `task` on `agent` with the given iteration budget and deadline.
    pub async fn run_agent_task(
        &self,
        agent: AgentId,
        task: &str,
        max_iterations: usize,
        timeout: Duration,
    ) -> TaskResult {
        let ctx = TaskContext::new()
            .with_max_iterations(max_iterations)
            .with_timeout(timeout);
        self.run(agent, task, ctx).await
    }

    pub async fn run(&self, agent: AgentId, task: &str, ctx: TaskContext) -> TaskResult {
        self.run_observed(agent, task, ctx, None).await
    }

    /// Like [`run`](Self::run), forwarding every [`StepEvent`] to `observer`.
    pub async fn run_observed(
        &self,
        agent: AgentId,
        task: &str,
        ctx: TaskContext,
        observer: Option<mpsc::UnboundedSender<StepEvent>>,
    ) -> TaskResult {
        let started = Instant::now();
        let config = ctx.apply(&self.config);

        let agent_name = match config.validate().and_then(|_| self.graph.agent(agent)) {
            Ok(definition) => definition.name().to_string(),
            Err(e) => {
                info!(task_id = %ctx.task_id, error = %e, "Task rejected");
                return TaskResult::rejected(ctx.task_id, &e, started);
            }
        };

        let span = SpanContext::new(&ctx.task_id).task_span(&agent_name);
        let result = self
            .execute(agent, task, ctx, config, observer, started)
            .instrument(span.clone())
            .await;

        span.record("status", format!("{:?}", result.status).as_str());
        span.record("elapsed_ms", result.elapsed_ms);
        let cost = result
            .total_cost
            .map(|c| c.to_string())
            .unwrap_or_else(|| "unavailable".into());
        info!(
            task_id = %result.task_id,
            status = ?result.status,
            steps = result.log.len(),
            elapsed_ms = result.elapsed_ms,
            cost = %cost,
            "Task finished"
        );
        result
    }

    async fn execute(
        &self,
        agent: AgentId,
        task: &str,
        ctx: TaskContext,
        config: ExecutionConfig,
        observer: Option<mpsc::UnboundedSender<StepEvent>>,
        started: Instant,
    ) -> TaskResult {
        let runner = IsolatedRunner::new(config.timeout).with_teardown_grace(config.teardown_grace);
        let mut coordinator =
            DelegationCoordinator::new(self.graph.clone(), self.client.clone()).with_config(config);
        if let Some(pricing) = &self.pricing {
            coordinator = coordinator.with_pricing(pricing.clone());
        }

        let TaskContext {
            task_id, api_key, ..
        } = ctx;
        let task = task.to_string();
        let outcome = runner
            .run_with_timeout(
                move |scope| async move {
                    coordinator
                        .run_in(agent, &task, api_key.as_ref(), &scope)
                        .await
                },
                observer,
            )
            .await;

        match outcome {
            Ok(output) => TaskResult::from_output(task_id, output, started),
            Err(error) => TaskResult::from_runner_error(task_id, error, started),
        }
    }
}

impl std::fmt::Debug for AgentTeam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentTeam")
            .field("agents", &self.graph.len())
            .field("client", &self.client.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_context_overrides() {
        let ctx = TaskContext::new()
            .with_model("gpt-4o")
            .with_max_iterations(2)
            .with_timeout(Duration::from_millis(500))
            .with_api_key("sk-task");
        let config = ctx.apply(&ExecutionConfig::default());
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.max_iterations, 2);
        assert_eq!(config.max_handoffs, 10);
        assert_eq!(config.timeout, Duration::from_millis(500));
        assert_eq!(ctx.api_key.unwrap().expose_secret(), "sk-task");
    }

    #[test]
    fn test_task_ids_are_unique() {
        assert_ne!(TaskContext::new().task_id, TaskContext::new().task_id);
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_value(TaskStatus::TimedOut).unwrap(),
            serde_json::json!("timed_out")
        );
        assert_eq!(TaskStatus::from(RunStatus::Incomplete), TaskStatus::Incomplete);
    }
}
