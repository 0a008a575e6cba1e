//! Completion service abstraction and adapters.
//!
//! The agent loop only talks to [`CompletionService`]. [`OpenAiClient`] speaks
//! the OpenAI-compatible chat-completions protocol; [`ScriptedCompletion`]
//! replays canned responses for offline runs and tests.

mod error;
mod openai;
pub mod scripted;

pub use error::CompletionError;
pub use openai::{DEFAULT_BASE_URL, OpenAiClient, OpenAiClientBuilder};
pub use scripted::{RecordedRequest, ScriptStep, ScriptedCompletion};

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::types::{Message, ToolCallRequest, ToolDefinition};

/// Model used when neither the agent nor the task names one.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// How the model may pick tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Required,
}

impl ToolChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::None => "none",
            Self::Required => "required",
        }
    }
}

/// One chat-completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub tools: &'a [ToolDefinition],
    pub tool_choice: ToolChoice,
    pub temperature: Option<f32>,
    /// Per-task credential; overrides the service's own key when present.
    pub api_key: Option<&'a SecretString>,
}

impl<'a> CompletionRequest<'a> {
    pub fn new(model: &'a str, messages: &'a [Message], tools: &'a [ToolDefinition]) -> Self {
        Self {
            model,
            messages,
            tools,
            tool_choice: ToolChoice::Auto,
            temperature: None,
            api_key: None,
        }
    }

    pub fn temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn api_key(mut self, api_key: Option<&'a SecretString>) -> Self {
        self.api_key = api_key;
        self
    }
}

/// Model reply: optional text plus zero or more tool calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,
}

impl CompletionResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: None,
            tool_calls,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Text the cost estimator counts as model output.
    pub fn output_text(&self) -> String {
        let mut text = self.content.clone().unwrap_or_default();
        for call in &self.tool_calls {
            text.push_str(&call.name);
            text.push_str(&call.arguments.to_string());
        }
        text
    }
}

/// Chat-completion backend used by the reasoning loop.
#[async_trait]
pub trait CompletionService: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(
        &self,
        request: CompletionRequest<'_>,
    ) -> Result<CompletionResponse, CompletionError>;
}
