//! ReAct reasoning loop for a single agent.

use std::time::Instant;

use secrecy::SecretString;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, instrument, warn};

use super::config::ExecutionConfig;
use super::context::ConversationState;
use super::definition::{AgentDefinition, AgentGraph, AgentId};
use super::events::{EventSink, StepEvent};
use super::state::{ErrorKind, StepError, StepRecord, ToolCallTrace};
use crate::budget::{self, PricingTable};
use crate::client::{CompletionRequest, CompletionService};
use crate::observability::{CompletionSpan, tool_span};
use crate::tools::Dispatcher;
use crate::types::{Message, Observation, ToolCallRequest, ToolDefinition, ToolError};

/// Why a reasoning loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The model answered without tool calls.
    Completed,
    /// `max_iterations` ran out first.
    Incomplete,
    /// The completion call failed.
    Failed,
    /// Control moves to another agent.
    HandedOff(AgentId),
    HandoffLimitReached,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub exit: LoopExit,
    pub final_answer: Option<String>,
    pub log: Vec<StepRecord>,
    pub conversation: ConversationState,
    pub error: Option<StepError>,
}

impl LoopOutcome {
    fn new(exit: LoopExit, conversation: ConversationState, log: Vec<StepRecord>) -> Self {
        Self {
            exit,
            final_answer: None,
            log,
            conversation,
            error: None,
        }
    }
}

/// Ask, record, dispatch, repeat; bounded by `max_iterations`.
///
/// One loop drives one agent over one conversation it owns. Handoffs end the
/// loop with [`LoopExit::HandedOff`]; starting the next agent is the
/// coordinator's job.
pub struct ReasoningLoop<'a> {
    graph: &'a AgentGraph,
    agent_id: AgentId,
    agent: &'a AgentDefinition,
    client: &'a dyn CompletionService,
    config: &'a ExecutionConfig,
    pricing: &'a PricingTable,
    cancel: CancellationToken,
    events: EventSink,
    api_key: Option<&'a SecretString>,
    hop: usize,
    chain: Vec<AgentId>,
    tools: Vec<ToolDefinition>,
}

impl<'a> ReasoningLoop<'a> {
    pub fn new(
        graph: &'a AgentGraph,
        agent_id: AgentId,
        client: &'a dyn CompletionService,
        config: &'a ExecutionConfig,
    ) -> crate::Result<Self> {
        config.validate()?;
        let agent = graph.agent(agent_id)?;
        let mut tools = agent.tools().definitions();
        tools.extend(graph.handoff_tools(agent_id));

        Ok(Self {
            graph,
            agent_id,
            agent,
            client,
            config,
            pricing: budget::global_pricing_table(),
            cancel: CancellationToken::new(),
            events: EventSink::disabled(),
            api_key: None,
            hop: 0,
            chain: vec![agent_id],
            tools,
        })
    }

    pub fn pricing(mut self, pricing: &'a PricingTable) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn api_key(mut self, api_key: Option<&'a SecretString>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Position in a delegation chain: handoffs taken so far and the agents
    /// already visited, which may not be handed to again.
    pub fn chain(mut self, hop: usize, visited: &[AgentId]) -> Self {
        self.hop = hop;
        self.chain = visited.to_vec();
        if !self.chain.contains(&self.agent_id) {
            self.chain.push(self.agent_id);
        }
        self
    }

    pub fn tool_definitions(&self) -> &[ToolDefinition] {
        &self.tools
    }

    /// Runs the loop on a fresh conversation: instructions, then `task`.
    pub async fn run(self, task: &str) -> LoopOutcome {
        let conversation = ConversationState::new(self.agent.instructions(), task);
        self.run_conversation(conversation).await
    }

    #[instrument(name = "agent.loop", skip_all, fields(agent = %self.agent.name(), hop = self.hop))]
    pub async fn run_conversation(self, mut conversation: ConversationState) -> LoopOutcome {
        let model = self.agent.model().unwrap_or(self.config.model.as_str());
        let mut log = Vec::new();

        info!(
            model,
            max_iterations = self.config.max_iterations,
            tools = self.tools.len(),
            "Starting reasoning loop"
        );

        for iteration in 1..=self.config.max_iterations {
            if self.cancel.is_cancelled() {
                return LoopOutcome::new(LoopExit::Cancelled, conversation, log);
            }

            self.events.emit(StepEvent::IterationStarted {
                hop: self.hop,
                agent: self.agent.name().to_string(),
                iteration,
            });
            debug!(iteration, "Starting iteration");

            let started = Instant::now();
            let mut step = StepRecord::new(self.hop, iteration, self.agent.name());
            let input_text = conversation.transcript();

            let request = CompletionRequest::new(model, conversation.messages(), &self.tools)
                .temperature(self.config.temperature)
                .api_key(self.api_key);
            let completion_span = CompletionSpan::new(model, iteration);
            let call = self
                .client
                .complete(request)
                .instrument(completion_span.span().clone());
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                result = call => Some(result),
            };
            let Some(result) = result else {
                debug!(iteration, "Cancelled during completion call");
                return LoopOutcome::new(LoopExit::Cancelled, conversation, log);
            };

            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    completion_span.finish(true);
                    warn!(iteration, error = %e, "Completion call failed");
                    let error = StepError::new(ErrorKind::CompletionService, e.to_string());
                    step.error = Some(error.clone());
                    step.duration_ms = started.elapsed().as_millis() as u64;
                    self.record(&mut log, step);
                    return LoopOutcome {
                        error: Some(error),
                        ..LoopOutcome::new(LoopExit::Failed, conversation, log)
                    };
                }
            };

            let estimate = budget::estimate(
                self.pricing,
                model,
                &input_text,
                &response.output_text(),
            );
            completion_span.record_estimate(&estimate);
            let latency_ms = completion_span.finish(false);
            debug!(iteration, latency_ms, cost = %estimate, "Completion received");
            step.thought = response.content.clone();
            step.cost_estimate = Some(estimate);
            conversation.push(Message::assistant(
                response.content.clone(),
                response.tool_calls.clone(),
            ));

            if response.tool_calls.is_empty() {
                let answer = response.content.unwrap_or_default();
                step.final_answer = Some(answer.clone());
                step.duration_ms = started.elapsed().as_millis() as u64;
                self.record(&mut log, step);
                info!(iteration, "Reasoning loop completed");
                return LoopOutcome {
                    final_answer: Some(answer),
                    ..LoopOutcome::new(LoopExit::Completed, conversation, log)
                };
            }

            let Some(round) = self
                .dispatch_round(iteration, &response.tool_calls, &mut step)
                .await
            else {
                debug!(iteration, "Cancelled during tool dispatch");
                return LoopOutcome::new(LoopExit::Cancelled, conversation, log);
            };

            for (call, (observation, trace)) in response.tool_calls.iter().zip(round.results) {
                conversation.push(Message::tool(&observation, &call.name));
                step.tool_calls.push(trace);
            }
            step.duration_ms = started.elapsed().as_millis() as u64;
            let step_error = step.error.clone();
            self.record(&mut log, step);

            if round.limit_reached {
                warn!(
                    limit = self.config.max_handoffs,
                    "Handoff limit reached, stopping"
                );
                return LoopOutcome {
                    error: step_error,
                    ..LoopOutcome::new(LoopExit::HandoffLimitReached, conversation, log)
                };
            }
            if let Some(target) = round.handoff {
                return LoopOutcome::new(LoopExit::HandedOff(target), conversation, log);
            }
        }

        warn!(
            max_iterations = self.config.max_iterations,
            "Iteration budget exhausted without a final answer"
        );
        LoopOutcome::new(LoopExit::Incomplete, conversation, log)
    }

    /// Executes one response's tool calls: ordinary tools first in received
    /// order, then handoffs. Results come back in the original call order.
    /// Returns `None` if cancelled mid-way.
    async fn dispatch_round(
        &self,
        iteration: usize,
        calls: &[ToolCallRequest],
        step: &mut StepRecord,
    ) -> Option<Round> {
        let dispatcher = Dispatcher::new(self.agent.tools());
        let mut slots: Vec<Option<(Observation, ToolCallTrace)>> = vec![None; calls.len()];

        for (index, call) in calls.iter().enumerate() {
            if self.graph.resolve_handoff(self.agent_id, &call.name).is_some() {
                continue;
            }
            let span = tool_span(&call.name, &call.id);
            let started = Instant::now();
            let dispatch = dispatcher.dispatch(call).instrument(span.clone());
            let observation = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                observation = dispatch => Some(observation),
            };
            let observation = observation?;
            let duration_ms = started.elapsed().as_millis() as u64;
            span.record("is_error", observation.is_error);
            span.record("duration_ms", duration_ms);
            let trace = ToolCallTrace::new(call, &observation, duration_ms);
            self.events.emit(StepEvent::ToolCompleted {
                agent: self.agent.name().to_string(),
                iteration,
                trace: trace.clone(),
            });
            slots[index] = Some((observation, trace));
        }

        let mut handoff = None;
        let mut limit_reached = false;
        for (index, call) in calls.iter().enumerate() {
            let Some(target) = self.graph.resolve_handoff(self.agent_id, &call.name) else {
                continue;
            };
            let target_name = self.graph.get(target).map(|a| a.name()).unwrap_or_default();

            let observation = if handoff.is_some() || limit_reached {
                Observation::error(
                    &call.id,
                    &ToolError::handoff_rejected("only one handoff per response is allowed"),
                )
            } else if self.chain.contains(&target) {
                Observation::error(
                    &call.id,
                    &ToolError::handoff_rejected(format!(
                        "agent '{}' is already working on this task",
                        target_name
                    )),
                )
            } else if self.hop >= self.config.max_handoffs {
                limit_reached = true;
                step.error = Some(StepError::new(
                    ErrorKind::TooManyHandoffs,
                    format!(
                        "handoff to '{}' exceeds the limit of {} handoffs",
                        target_name, self.config.max_handoffs
                    ),
                ));
                Observation::error(
                    &call.id,
                    &ToolError::handoff_rejected(format!(
                        "handoff limit of {} reached",
                        self.config.max_handoffs
                    )),
                )
            } else {
                debug!(from = %self.agent.name(), to = %target_name, "Handoff requested");
                handoff = Some(target);
                step.handoff = Some(target_name.to_string());
                Observation::success(&call.id, json!({ "assistant": target_name }).to_string())
            };

            let trace = ToolCallTrace::new(call, &observation, 0);
            self.events.emit(StepEvent::ToolCompleted {
                agent: self.agent.name().to_string(),
                iteration,
                trace: trace.clone(),
            });
            slots[index] = Some((observation, trace));
        }

        Some(Round {
            results: slots.into_iter().flatten().collect(),
            handoff,
            limit_reached,
        })
    }

    fn record(&self, log: &mut Vec<StepRecord>, step: StepRecord) {
        self.events.emit(StepEvent::StepRecorded(step.clone()));
        log.push(step);
    }
}

struct Round {
    results: Vec<(Observation, ToolCallTrace)>,
    handoff: Option<AgentId>,
    limit_reached: bool,
}
