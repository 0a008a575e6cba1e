//! Wall-clock tool.

use async_trait::async_trait;
use chrono::Local;
use schemars::JsonSchema;
use serde::Deserialize;

use super::TypedTool;
use crate::types::ToolError;

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct CurrentTimeInput {}

/// Reports the local date and time.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentTimeTool;

#[async_trait]
impl TypedTool for CurrentTimeTool {
    type Input = CurrentTimeInput;
    const NAME: &'static str = "get_current_time";
    const DESCRIPTION: &'static str = "Get the current date and time";

    async fn handle(&self, _input: CurrentTimeInput) -> Result<String, ToolError> {
        Ok(Local::now().format("%Y-%m-%d %H:%M:%S").to_string())
    }
}
