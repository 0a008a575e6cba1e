//! Conversation state owned by one reasoning loop.

use crate::types::{Message, Role};

/// Append-only message history.
///
/// Each reasoning loop owns its own state. A handoff copies the history into a
/// fresh state for the next agent instead of sharing it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    messages: Vec<Message>,
}

impl ConversationState {
    /// System instructions followed by the task.
    pub fn new(instructions: &str, task: &str) -> Self {
        Self {
            messages: vec![Message::system(instructions), Message::user(task)],
        }
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Seed for the next agent: its own instructions, then everything said so far.
    pub fn handoff(&self, instructions: &str) -> Self {
        let mut messages = Vec::with_capacity(self.messages.len());
        messages.push(Message::system(instructions));
        messages.extend(
            self.messages
                .iter()
                .filter(|m| m.role != Role::System)
                .cloned(),
        );
        Self { messages }
    }

    /// Concatenated text of every message, as counted by the cost estimator.
    pub fn transcript(&self) -> String {
        let mut out = String::new();
        for message in &self.messages {
            if let Some(content) = &message.content {
                out.push_str(content);
                out.push('\n');
            }
            for call in &message.tool_calls {
                out.push_str(&call.name);
                out.push_str(&call.arguments.to_string());
                out.push('\n');
            }
        }
        out
    }

    /// True when every assistant tool call is answered by tool messages in call order.
    pub fn tool_results_in_order(&self) -> bool {
        let mut iter = self.messages.iter().peekable();
        while let Some(message) = iter.next() {
            if message.role != Role::Assistant {
                continue;
            }
            for call in &message.tool_calls {
                match iter.next() {
                    Some(reply)
                        if reply.role == Role::Tool
                            && reply.tool_call_id.as_deref() == Some(call.id.as_str()) => {}
                    _ => return false,
                }
            }
        }
        true
    }
}
