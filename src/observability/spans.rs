//! Structured span definitions for tracing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::{Level, Span, field, span};

use crate::budget::CostEstimate;

/// Context for creating the spans of one task.
#[derive(Debug)]
pub struct SpanContext {
    task_id: String,
    run_id: AtomicU64,
}

impl SpanContext {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            run_id: AtomicU64::new(0),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn next_run_id(&self) -> u64 {
        self.run_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn task_span(&self, agent: &str) -> Span {
        let run_id = self.next_run_id();
        span!(
            Level::INFO,
            "task.run",
            task_id = %self.task_id,
            run_id = run_id,
            agent = agent,
            otel.name = "task.run",
            status = field::Empty,
            elapsed_ms = field::Empty,
        )
    }
}

/// Span around one tool call. `is_error` and `duration_ms` are recorded by the caller.
pub fn tool_span(tool_name: &str, call_id: &str) -> Span {
    span!(
        Level::DEBUG,
        "tool.dispatch",
        tool_name = tool_name,
        call_id = call_id,
        otel.name = format!("tool.{}", tool_name),
        is_error = field::Empty,
        duration_ms = field::Empty,
    )
}

/// Helper for tracking one completion call within a span.
pub struct CompletionSpan {
    span: Span,
    start: Instant,
}

impl CompletionSpan {
    pub fn new(model: &str, iteration: usize) -> Self {
        let span = span!(
            Level::DEBUG,
            "completion.call",
            model = model,
            iteration = iteration,
            otel.name = "completion.call",
            input_tokens = field::Empty,
            output_tokens = field::Empty,
            latency_ms = field::Empty,
            is_error = field::Empty,
        );
        Self {
            span,
            start: Instant::now(),
        }
    }

    pub fn record_estimate(&self, estimate: &CostEstimate) {
        if let CostEstimate::Estimated {
            input_tokens,
            output_tokens,
            ..
        } = estimate
        {
            self.span.record("input_tokens", *input_tokens);
            self.span.record("output_tokens", *output_tokens);
        }
    }

    pub fn finish(self, is_error: bool) -> u64 {
        let latency_ms = self.start.elapsed().as_millis() as u64;
        self.span.record("latency_ms", latency_ms);
        self.span.record("is_error", is_error);
        latency_ms
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}
