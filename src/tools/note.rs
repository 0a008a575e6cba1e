//! Note-taking tool.

use async_trait::async_trait;
use chrono::Local;
use schemars::JsonSchema;
use serde::Deserialize;

use super::TypedTool;
use crate::types::ToolError;

const PREVIEW_CHARS: usize = 50;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SaveNoteInput {
    /// Note text
    pub content: String,
}

/// Acknowledges a note with a timestamp. Nothing is persisted.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveNoteTool;

#[async_trait]
impl TypedTool for SaveNoteTool {
    type Input = SaveNoteInput;
    const NAME: &'static str = "save_note";
    const DESCRIPTION: &'static str = "Save a short note for later reference";

    async fn handle(&self, input: SaveNoteInput) -> Result<String, ToolError> {
        let preview: String = input.content.chars().take(PREVIEW_CHARS).collect();
        Ok(format!(
            "Note saved: '{}...' at {}",
            preview,
            Local::now().format("%H:%M:%S")
        ))
    }
}
