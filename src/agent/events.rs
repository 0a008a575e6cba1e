//! Progress events emitted while an agent task runs.

use tokio::sync::mpsc;

use super::state::{StepRecord, ToolCallTrace};

/// Events emitted during agent execution.
#[derive(Debug, Clone)]
pub enum StepEvent {
    /// An iteration began; sent before the completion call.
    IterationStarted {
        hop: usize,
        agent: String,
        iteration: usize,
    },
    ToolCompleted {
        agent: String,
        iteration: usize,
        trace: ToolCallTrace,
    },
    HandoffTaken {
        from: String,
        to: String,
        hop: usize,
    },
    /// A finished iteration, in the same form it takes in the execution log.
    StepRecorded(StepRecord),
}

/// Optional sender for [`StepEvent`]s. Sends never block and never fail the run.
#[derive(Debug, Clone, Default)]
pub struct EventSink(Option<mpsc::UnboundedSender<StepEvent>>);

impl EventSink {
    pub fn new(sender: mpsc::UnboundedSender<StepEvent>) -> Self {
        Self(Some(sender))
    }

    pub fn disabled() -> Self {
        Self(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    pub fn emit(&self, event: StepEvent) {
        if let Some(tx) = &self.0 {
            // Receiver gone means nobody is listening any more.
            let _ = tx.send(event);
        }
    }
}

impl From<mpsc::UnboundedSender<StepEvent>> for EventSink {
    fn from(sender: mpsc::UnboundedSender<StepEvent>) -> Self {
        Self::new(sender)
    }
}
