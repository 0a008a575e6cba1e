//! Tool definition types.

use serde::{Deserialize, Serialize};

/// Name, description and JSON parameter schema of a tool, as advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Character count used by the cost estimator when tool schemas are sent.
    pub fn encoded_len(&self) -> usize {
        self.name.chars().count()
            + self.description.chars().count()
            + self.parameters.to_string().chars().count()
    }
}
