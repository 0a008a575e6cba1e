//! Tool-related types.

mod definition;
mod error;
mod observation;

pub use definition::ToolDefinition;
pub use error::ToolError;
pub use observation::Observation;
