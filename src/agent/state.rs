//! Execution log records and run status types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::budget::{CostEstimate, CostSummary};
use crate::types::{Observation, ToolCallRequest};

/// Outcome of a coordinated run, without the runner-level `timed_out` case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Incomplete,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CompletionService,
    TooManyHandoffs,
    Timeout,
    Cancelled,
    Fatal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CompletionService => "completion_service",
            Self::TooManyHandoffs => "too_many_handoffs",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Fatal => "fatal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepError {
    pub kind: ErrorKind,
    pub message: String,
}

impl StepError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

/// One tool call as it appears in the execution log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallTrace {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ToolCallTrace {
    pub fn new(call: &ToolCallRequest, observation: &Observation, duration_ms: u64) -> Self {
        let (result, error) = if observation.is_error {
            (None, Some(observation.content.clone()))
        } else {
            (Some(observation.content.clone()), None)
        };
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            result,
            error,
            duration_ms,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Everything that happened in one reasoning loop iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Number of handoffs taken before this step's agent started.
    pub hop: usize,
    /// 1-based iteration within the agent's loop.
    pub iteration: usize,
    pub agent_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallTrace>,
    /// Agent this step handed off to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handoff: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
    /// `None` when no completion came back for this step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_estimate: Option<CostEstimate>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl StepRecord {
    pub fn new(hop: usize, iteration: usize, agent_name: impl Into<String>) -> Self {
        Self {
            hop,
            iteration,
            agent_name: agent_name.into(),
            thought: None,
            tool_calls: Vec::new(),
            handoff: None,
            final_answer: None,
            error: None,
            cost_estimate: None,
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    /// Record for an iteration that was cut off before it finished.
    pub fn interrupted(
        hop: usize,
        iteration: usize,
        agent_name: impl Into<String>,
        error: StepError,
    ) -> Self {
        Self {
            error: Some(error),
            ..Self::new(hop, iteration, agent_name)
        }
    }

    pub fn with_error(mut self, error: StepError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn is_final(&self) -> bool {
        self.final_answer.is_some()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Whether a completion call was made for this step, successful or not.
    pub fn made_completion_call(&self) -> bool {
        self.cost_estimate.is_some()
            || self
                .error
                .as_ref()
                .is_some_and(|e| e.kind == ErrorKind::CompletionService)
    }
}

/// Ordered step records of a whole task, across all agents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionLog {
    steps: Vec<StepRecord>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: StepRecord) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StepRecord> {
        self.steps.iter()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last(&self) -> Option<&StepRecord> {
        self.steps.last()
    }

    pub fn into_steps(self) -> Vec<StepRecord> {
        self.steps
    }

    /// Names of agents in the order they first appear.
    pub fn agents(&self) -> Vec<&str> {
        let mut agents: Vec<&str> = Vec::new();
        for step in &self.steps {
            if !agents.contains(&step.agent_name.as_str()) {
                agents.push(&step.agent_name);
            }
        }
        agents
    }

    pub fn cost_summary(&self) -> CostSummary {
        CostSummary::from_estimates(self.steps.iter().filter_map(|s| s.cost_estimate.as_ref()))
    }

    pub fn metrics(&self) -> TaskMetrics {
        TaskMetrics::from_log(self)
    }
}

impl Extend<StepRecord> for ExecutionLog {
    fn extend<T: IntoIterator<Item = StepRecord>>(&mut self, iter: T) {
        self.steps.extend(iter);
    }
}

impl From<Vec<StepRecord>> for ExecutionLog {
    fn from(steps: Vec<StepRecord>) -> Self {
        Self { steps }
    }
}

impl IntoIterator for ExecutionLog {
    type Item = StepRecord;
    type IntoIter = std::vec::IntoIter<StepRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.into_iter()
    }
}

impl<'a> IntoIterator for &'a ExecutionLog {
    type Item = &'a StepRecord;
    type IntoIter = std::slice::Iter<'a, StepRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolStats {
    pub calls: usize,
    pub errors: usize,
    pub total_time_ms: u64,
}

/// Counters derived from an execution log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetrics {
    pub steps: usize,
    pub api_calls: usize,
    pub tool_calls: usize,
    pub tool_errors: usize,
    pub handoffs: usize,
    pub agents: Vec<String>,
    pub tool_stats: HashMap<String, ToolStats>,
}

impl TaskMetrics {
    pub fn from_log(log: &ExecutionLog) -> Self {
        let mut metrics = Self {
            steps: log.len(),
            agents: log.agents().into_iter().map(String::from).collect(),
            ..Default::default()
        };

        for step in log {
            if step.made_completion_call() {
                metrics.api_calls += 1;
            }
            if step.handoff.is_some() {
                metrics.handoffs += 1;
            }
            for call in &step.tool_calls {
                metrics.record_tool(&call.name, call.duration_ms, call.is_error());
            }
        }

        metrics
    }

    fn record_tool(&mut self, name: &str, duration_ms: u64, is_error: bool) {
        self.tool_calls += 1;
        let stats = self.tool_stats.entry(name.to_string()).or_default();
        stats.calls += 1;
        stats.total_time_ms += duration_ms;
        if is_error {
            stats.errors += 1;
            self.tool_errors += 1;
        }
    }
}
