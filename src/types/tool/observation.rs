//! Tool observations fed back into the conversation.

use serde::{Deserialize, Serialize};

use super::error::ToolError;

/// Textual result of one tool call. Errors are observations too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub call_id: String,
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

impl Observation {
    pub fn success(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(call_id: impl Into<String>, error: &ToolError) -> Self {
        Self {
            call_id: call_id.into(),
            content: error.to_string(),
            is_error: true,
        }
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }
}
