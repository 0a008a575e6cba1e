//! Scripted completion service.
//!
//! Replays a fixed list of steps in order and records every request it
//! receives. Useful for offline demos and for driving the agent loop in tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{CompletionError, CompletionRequest, CompletionResponse, CompletionService};
use crate::types::Message;

/// One scripted reaction to a completion request.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Reply(CompletionResponse),
    Fail(CompletionError),
    /// Reply after sleeping.
    Delayed(Duration, CompletionResponse),
    /// Never resolves.
    Hang,
}

/// Snapshot of a request seen by [`ScriptedCompletion`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<String>,
}

impl RecordedRequest {
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == crate::types::Role::System)
            .map(Message::text)
    }
}

#[derive(Debug, Default)]
pub struct ScriptedCompletion {
    steps: Mutex<VecDeque<ScriptStep>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedCompletion {
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Script made only of replies.
    pub fn replies(responses: impl IntoIterator<Item = CompletionResponse>) -> Self {
        Self::new(responses.into_iter().map(ScriptStep::Reply))
    }

    pub fn push(&self, step: ScriptStep) {
        if let Ok(mut steps) = self.steps.lock() {
            steps.push_back(step);
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.steps.lock().map(|s| s.len()).unwrap_or_default()
    }

    fn next_step(&self, request: &CompletionRequest<'_>) -> Option<ScriptStep> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                model: request.model.to_string(),
                messages: request.messages.to_vec(),
                tools: request.tools.iter().map(|t| t.name.clone()).collect(),
            });
        }
        self.steps.lock().ok().and_then(|mut steps| steps.pop_front())
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        request: CompletionRequest<'_>,
    ) -> Result<CompletionResponse, CompletionError> {
        match self.next_step(&request) {
            Some(ScriptStep::Reply(response)) => Ok(response),
            Some(ScriptStep::Fail(error)) => Err(error),
            Some(ScriptStep::Delayed(delay, response)) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            Some(ScriptStep::Hang) => futures::future::pending().await,
            None => Err(CompletionError::other("completion script exhausted")),
        }
    }
}
