//! Structured tracing spans for task runs, completion calls and tool dispatch.
//!
//! The crate never installs a subscriber; applications choose one
//! (`tracing-subscriber`, an OpenTelemetry layer, ...) and get named spans
//! with structured fields:
//!
//! - `task.run`: one isolated task, with `task_id`, `agent` and the final `status`
//! - `completion.call`: one model request, with estimated tokens and latency
//! - `tool.dispatch`: one tool call, with `is_error` and `duration_ms`

mod spans;

pub use spans::{CompletionSpan, SpanContext, tool_span};
