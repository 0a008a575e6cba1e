//! Delegation across agents: runs one reasoning loop per hop.

use std::sync::Arc;

use secrecy::SecretString;
use serde::Serialize;
use tracing::{info, instrument};

use super::config::ExecutionConfig;
use super::context::ConversationState;
use super::definition::{AgentGraph, AgentId};
use super::events::StepEvent;
use super::execution::{LoopExit, ReasoningLoop};
use super::runner::WorkerScope;
use super::state::{ExecutionLog, RunStatus, StepError};
use crate::budget::{PricingTable, global_pricing_table};
use crate::client::CompletionService;

/// Final answer and log of a coordinated run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub status: RunStatus,
    pub final_answer: Option<String>,
    /// Agent that was in control when the run ended.
    pub final_agent: String,
    pub log: ExecutionLog,
    /// Set when `status` is `Failed`.
    pub failure: Option<StepError>,
}

/// Runs the root agent and follows handoffs until an agent finishes.
///
/// Every hop starts a new [`ReasoningLoop`] with a fresh iteration budget and
/// a copy of the conversation so far under the target's own instructions.
/// Agents already in the chain cannot be handed to again, and more than
/// `max_handoffs` hops fail the run with [`Error::TooManyHandoffs`](crate::Error::TooManyHandoffs).
#[derive(Clone)]
pub struct DelegationCoordinator {
    graph: Arc<AgentGraph>,
    client: Arc<dyn CompletionService>,
    config: ExecutionConfig,
    pricing: Option<Arc<PricingTable>>,
}

impl DelegationCoordinator {
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

    pub fn with_pricing(mut self, pricing: Arc<PricingTable>) -> Self {
        self.pricing = Some(pricing);
        self
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn graph(&self) -> &AgentGraph {
        &self.graph
    }

    fn pricing(&self) -> &PricingTable {
        match &self.pricing {
            Some(pricing) => pricing,
            None => global_pricing_table(),
        }
    }

    pub async fn run(&self, root: AgentId, task: &str) -> crate::Result<RunOutput> {
        self.run_in(root, task, None, &WorkerScope::default()).await
    }

    /// Runs under a caller-provided cancellation token and event sink.
    #[instrument(skip(self, task, api_key, scope), fields(root = %root))]
    pub async fn run_in(
        &self,
        root: AgentId,
        task: &str,
        api_key: Option<&SecretString>,
        scope: &WorkerScope,
    ) -> crate::Result<RunOutput> {
        self.config.validate()?;

        let mut current = root;
        let mut agent = self.graph.agent(current)?;
        let mut conversation = ConversationState::new(agent.instructions(), task);
        let mut visited = Vec::new();
        let mut hop = 0;
        let mut log = ExecutionLog::new();

        loop {
            visited.push(current);
            let reasoning =
                ReasoningLoop::new(&self.graph, current, self.client.as_ref(), &self.config)?;
            let outcome = reasoning
                .pricing(self.pricing())
                .cancellation(scope.cancel.clone())
                .events(scope.events.clone())
                .api_key(api_key)
                .chain(hop, &visited)
                .run_conversation(conversation)
                .await;
            log.extend(outcome.log);

            let status = match outcome.exit {
                LoopExit::Completed => RunStatus::Completed,
                LoopExit::Incomplete => RunStatus::Incomplete,
                LoopExit::Failed => RunStatus::Failed,
                LoopExit::Cancelled => return Err(crate::Error::Cancelled),
                LoopExit::HandoffLimitReached => {
                    return Err(crate::Error::TooManyHandoffs {
                        limit: self.config.max_handoffs,
                    });
                }
                LoopExit::HandedOff(target) => {
                    let next = self.graph.agent(target)?;
                    hop += 1;
                    info!(from = %agent.name(), to = %next.name(), hop, "Handing off");
                    scope.events.emit(StepEvent::HandoffTaken {
                        from: agent.name().to_string(),
                        to: next.name().to_string(),
                        hop,
                    });
                    conversation = outcome.conversation.handoff(next.instructions());
                    current = target;
                    agent = next;
                    continue;
                }
            };

            info!(?status, agent = %agent.name(), steps = log.len(), "Run finished");
            return Ok(RunOutput {
                status,
                final_answer: outcome.final_answer,
                final_agent: agent.name().to_string(),
                log,
                failure: outcome.error,
            });
        }
    }
}

impl std::fmt::Debug for DelegationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegationCoordinator")
            .field("agents", &self.graph.len())
            .field("client", &self.client.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
