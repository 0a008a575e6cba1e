//! Agent definitions and the agent graph.
//!
//! Agents live in an arena ([`AgentGraph`]) and refer to their handoff
//! targets by [`AgentId`], so mutual and cyclic handoffs need no shared
//! ownership. The graph is validated once by [`AgentGraphBuilder::build`]
//! and is read-only afterwards.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::tools::ToolRegistry;
use crate::types::ToolDefinition;

const HANDOFF_PREFIX: &str = "transfer_to_";

/// Index of an agent inside an [`AgentGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(usize);

impl AgentId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

/// Name, instructions, tools and allowed handoff targets of one agent.
#[derive(Debug, Clone)]
pub struct AgentDefinition {
    name: String,
    instructions: String,
    tools: Arc<ToolRegistry>,
    handoffs: Vec<AgentId>,
    handoff_description: Option<String>,
    model: Option<String>,
}

impl AgentDefinition {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            tools: Arc::new(ToolRegistry::new()),
            handoffs: Vec::new(),
            handoff_description: None,
            model: None,
        }
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Arc::new(tools);
        self
    }

    pub fn with_shared_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_handoffs(mut self, targets: impl IntoIterator<Item = AgentId>) -> Self {
        self.handoffs.extend(targets);
        self
    }

    /// Shown to other agents in the description of the handoff tool.
    pub fn with_handoff_description(mut self, description: impl Into<String>) -> Self {
        self.handoff_description = Some(description.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn handoffs(&self) -> &[AgentId] {
        &self.handoffs
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Name of the tool other agents call to hand off to this one.
    pub fn handoff_tool_name(&self) -> String {
        format!("{}{}", HANDOFF_PREFIX, slug(&self.name))
    }

    fn handoff_tool(&self) -> ToolDefinition {
        let mut description = format!("Handoff to the {} agent to handle the request.", self.name);
        if let Some(extra) = &self.handoff_description {
            description.push(' ');
            description.push_str(extra);
        }
        ToolDefinition::new(
            self.handoff_tool_name(),
            description,
            json!({"type": "object", "properties": {}, "additionalProperties": false}),
        )
    }
}

fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

/// Validated, immutable arena of agents.
#[derive(Debug, Clone)]
pub struct AgentGraph {
    agents: Vec<AgentDefinition>,
}

impl AgentGraph {
    pub fn builder() -> AgentGraphBuilder {
        AgentGraphBuilder::default()
    }

    pub fn get(&self, id: AgentId) -> Option<&AgentDefinition> {
        self.agents.get(id.0)
    }

    pub fn agent(&self, id: AgentId) -> crate::Result<&AgentDefinition> {
        self.get(id)
            .ok_or_else(|| crate::Error::UnknownAgent(id.to_string()))
    }

    pub fn find(&self, name: &str) -> Option<AgentId> {
        self.agents
            .iter()
            .position(|a| a.name == name)
            .map(AgentId)
    }

    pub fn ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        (0..self.agents.len()).map(AgentId)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Handoff tool definitions offered to `id`, one per allowed target.
    pub fn handoff_tools(&self, id: AgentId) -> Vec<ToolDefinition> {
        self.get(id)
            .map(|agent| {
                agent
                    .handoffs
                    .iter()
                    .filter_map(|target| self.get(*target))
                    .map(AgentDefinition::handoff_tool)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Target of a handoff tool call made by `from`, if `tool_name` is one.
    pub fn resolve_handoff(&self, from: AgentId, tool_name: &str) -> Option<AgentId> {
        if !tool_name.starts_with(HANDOFF_PREFIX) {
            return None;
        }
        self.get(from)?
            .handoffs
            .iter()
            .copied()
            .find(|target| {
                self.get(*target)
                    .is_some_and(|agent| agent.handoff_tool_name() == tool_name)
            })
    }
}

/// Collects agent definitions and checks them on [`build`](Self::build).
#[derive(Debug, Default)]
pub struct AgentGraphBuilder {
    agents: Vec<AgentDefinition>,
}

impl AgentGraphBuilder {
    pub fn add(&mut self, agent: AgentDefinition) -> AgentId {
        self.agents.push(agent);
        AgentId(self.agents.len() - 1)
    }

    /// Adds a handoff edge after both agents exist, for cycles.
    pub fn add_handoff(&mut self, from: AgentId, to: AgentId) -> crate::Result<()> {
        let agent = self
            .agents
            .get_mut(from.0)
            .ok_or_else(|| crate::Error::UnknownAgent(from.to_string()))?;
        agent.handoffs.push(to);
        Ok(())
    }

    pub fn build(self) -> crate::Result<AgentGraph> {
        let graph = AgentGraph {
            agents: self.agents,
        };

        let mut names = HashSet::new();
        let mut slugs = HashSet::new();
        for agent in &graph.agents {
            if agent.name.trim().is_empty() {
                return Err(crate::Error::Config("agent name must not be empty".into()));
            }
            if !names.insert(agent.name.as_str()) {
                return Err(crate::Error::Config(format!(
                    "duplicate agent name '{}'",
                    agent.name
                )));
            }
            if !slugs.insert(agent.handoff_tool_name()) {
                return Err(crate::Error::Config(format!(
                    "agent name '{}' collides with another agent's handoff tool",
                    agent.name
                )));
            }
        }

        for (index, agent) in graph.agents.iter().enumerate() {
            let mut seen = HashSet::new();
            for target in &agent.handoffs {
                let target_agent = graph.agent(*target)?;
                if target.0 == index {
                    return Err(crate::Error::Config(format!(
                        "agent '{}' cannot hand off to itself",
                        agent.name
                    )));
                }
                if !seen.insert(*target) {
                    return Err(crate::Error::Config(format!(
                        "agent '{}' lists handoff to '{}' twice",
                        agent.name, target_agent.name
                    )));
                }
                let tool_name = target_agent.handoff_tool_name();
                if agent.tools.contains(&tool_name) {
                    return Err(crate::Error::Config(format!(
                        "agent '{}' has a tool named '{}' which shadows a handoff",
                        agent.name, tool_name
                    )));
                }
            }
        }

        Ok(graph)
    }
}
