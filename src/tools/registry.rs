//! Tool registry.

use std::collections::HashMap;
use std::sync::Arc;

use super::Tool;
use crate::types::ToolDefinition;

/// Name-indexed set of tools.
///
/// Registration order is kept so the model always sees tool definitions in a
/// stable order. Once built, a registry is shared read-only behind an `Arc`.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the demo tools: `calculate`, `search_web`,
    /// `get_weather`, `save_note`, `get_current_time`, `analyze_data` and
    /// `get_market_data`.
    pub fn demo_tools() -> Self {
        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(super::CalculateTool),
            Arc::new(super::SearchWebTool),
            Arc::new(super::WeatherTool),
            Arc::new(super::SaveNoteTool),
            Arc::new(super::CurrentTimeTool),
            Arc::new(super::AnalyzeDataTool),
            Arc::new(super::MarketDataTool),
        ];

        let mut registry = Self::new();
        for tool in tools {
            registry.insert(tool);
        }
        registry
    }

    /// Registers a tool. Fails if a tool with the same name already exists.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> crate::Result<()> {
        if self.tools.contains_key(tool.name()) {
            return Err(crate::Error::DuplicateTool {
                name: tool.name().to_string(),
            });
        }
        self.insert(tool);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, tool: impl Tool + 'static) -> crate::Result<Self> {
        self.register(Arc::new(tool))?;
        Ok(self)
    }

    fn insert(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.order.push(name.clone());
        self.tools.insert(name, tool);
    }

    /// Copy of this registry restricted to `names`, in the order given.
    pub fn subset<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> crate::Result<Self> {
        let mut registry = Self::new();
        for name in names {
            let tool = self
                .tools
                .get(name)
                .ok_or_else(|| crate::Error::Config(format!("unknown tool: {}", name)))?;
            registry.register(Arc::clone(tool))?;
        }
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}
