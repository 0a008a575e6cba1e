//! Core types shared by the tool layer, the completion client and the agent loop.

mod message;
mod tool;

pub use message::{Message, Role, ToolCallRequest};
pub use tool::{Observation, ToolDefinition, ToolError};
