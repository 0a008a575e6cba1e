//! Tool trait definitions.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::types::{ToolDefinition, ToolError};

/// Core tool trait for all tool implementations.
///
/// Every handler shares one signature: a JSON object of arguments in, text or
/// a [`ToolError`] out. The dispatcher validates arguments against
/// [`Tool::input_schema`] before calling [`Tool::execute`].
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> Value;
    async fn execute(&self, arguments: Map<String, Value>) -> Result<String, ToolError>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.input_schema())
    }
}

/// Tool with a typed input whose JSON schema is derived via schemars.
#[async_trait]
pub trait TypedTool: Send + Sync {
    type Input: JsonSchema + DeserializeOwned + Send;
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    async fn handle(&self, input: Self::Input) -> Result<String, ToolError>;

    fn input_schema() -> Value {
        let schema = schemars::schema_for!(Self::Input);
        let mut value = serde_json::to_value(schema)
            .unwrap_or_else(|_| serde_json::json!({"type": "object"}));

        if let Some(obj) = value.as_object_mut() {
            obj.remove("$schema");
            obj.remove("title");
            if !obj.contains_key("properties") {
                obj.insert("properties".to_string(), Value::Object(Map::new()));
            }
        }

        value
    }
}

#[async_trait]
impl<T: TypedTool + 'static> Tool for T {
    fn name(&self) -> &str {
        T::NAME
    }

    fn description(&self) -> &str {
        T::DESCRIPTION
    }

    fn input_schema(&self) -> Value {
        T::input_schema()
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<String, ToolError> {
        let typed = serde_json::from_value::<T::Input>(Value::Object(arguments))
            .map_err(|e| ToolError::invalid_arguments(e.to_string()))?;
        TypedTool::handle(self, typed).await
    }
}

type Handler = dyn Fn(Map<String, Value>) -> Result<String, ToolError> + Send + Sync;

/// Tool backed by a synchronous closure and an explicit schema.
pub struct FnTool {
    name: String,
    description: String,
    schema: Value,
    handler: Box<Handler>,
}

impl FnTool {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Map<String, Value>) -> Result<String, ToolError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            handler: Box::new(handler),
        }
    }
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<String, ToolError> {
        (self.handler)(arguments)
    }
}
