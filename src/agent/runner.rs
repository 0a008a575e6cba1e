//! Isolated task execution with a hard wall-clock limit.

use std::future::Future;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::DEFAULT_TEARDOWN_GRACE;
use super::coordinator::RunOutput;
use super::events::{EventSink, StepEvent};
use super::state::{ErrorKind, ExecutionLog, StepError, StepRecord, ToolCallTrace};
use crate::tools::panic_message;

/// Cancellation token and event sink handed to a worker.
#[derive(Debug, Clone, Default)]
pub struct WorkerScope {
    pub cancel: CancellationToken,
    pub events: EventSink,
}

impl WorkerScope {
    pub fn new(cancel: CancellationToken, events: EventSink) -> Self {
        Self { cancel, events }
    }
}

/// A run that did not produce a [`RunOutput`]. Both variants keep the steps
/// recorded before the failure.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("task timed out after {:.1}s", .timeout.as_secs_f64())]
    Timeout {
        timeout: Duration,
        log: ExecutionLog,
    },

    #[error("task failed ({}): {message}", .kind.as_str())]
    Fatal {
        kind: ErrorKind,
        message: String,
        log: ExecutionLog,
    },
}

impl RunnerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Fatal { kind, .. } => *kind,
        }
    }

    pub fn log(&self) -> &ExecutionLog {
        match self {
            Self::Timeout { log, .. } | Self::Fatal { log, .. } => log,
        }
    }

    pub fn into_log(self) -> ExecutionLog {
        match self {
            Self::Timeout { log, .. } | Self::Fatal { log, .. } => log,
        }
    }
}

fn error_kind(error: &crate::Error) -> ErrorKind {
    match error {
        crate::Error::TooManyHandoffs { .. } => ErrorKind::TooManyHandoffs,
        crate::Error::Completion(_) => ErrorKind::CompletionService,
        crate::Error::Cancelled => ErrorKind::Cancelled,
        _ => ErrorKind::Fatal,
    }
}

/// Runs one invocation on its own tokio task under a deadline.
///
/// On timeout the worker's cancellation token fires first. A worker that
/// does not stop within `teardown_grace` is aborted, and the runner always
/// joins the task before returning, so nothing of the invocation is still
/// running afterwards. A tool handler that blocks its thread synchronously
/// cannot be interrupted; the join waits for it and its result is discarded.
#[derive(Debug, Clone, Copy)]
pub struct IsolatedRunner {
    timeout: Duration,
    teardown_grace: Duration,
}

impl IsolatedRunner {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            teardown_grace: DEFAULT_TEARDOWN_GRACE,
        }
    }

    pub fn with_teardown_grace(mut self, grace: Duration) -> Self {
        self.teardown_grace = grace;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Spawns `invocation` and waits for it, at most `timeout`.
    ///
    /// Events the worker emits are forwarded to `observer` as they arrive and
    /// are used to rebuild the partial log when the run does not finish.
    pub async fn run_with_timeout<F, Fut>(
        &self,
        invocation: F,
        observer: Option<mpsc::UnboundedSender<StepEvent>>,
    ) -> Result<RunOutput, RunnerError>
    where
        F: FnOnce(WorkerScope) -> Fut,
        Fut: Future<Output = crate::Result<RunOutput>> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scope = WorkerScope::new(cancel.clone(), EventSink::new(tx));
        let mut collector = LogCollector::new(observer);

        let mut handle = tokio::spawn(invocation(scope));
        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let joined = loop {
            tokio::select! {
                biased;
                joined = &mut handle => break Some(joined),
                Some(event) = rx.recv() => collector.observe(event),
                _ = &mut deadline => break None,
            }
        };

        let Some(joined) = joined else {
            warn!(
                timeout_ms = self.timeout.as_millis() as u64,
                "Task deadline reached, cancelling worker"
            );
            cancel.cancel();
            if tokio::time::timeout(self.teardown_grace, &mut handle)
                .await
                .is_err()
            {
                debug!("Worker ignored cancellation, aborting");
                handle.abort();
                let _ = (&mut handle).await;
            }
            collector.drain(&mut rx);
            let interruption = StepError::new(
                ErrorKind::Timeout,
                format!("task exceeded {:.1}s", self.timeout.as_secs_f64()),
            );
            return Err(RunnerError::Timeout {
                timeout: self.timeout,
                log: collector.finish(Some(interruption)),
            });
        };

        collector.drain(&mut rx);
        match joined {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => {
                let kind = error_kind(&e);
                warn!(error = %e, kind = kind.as_str(), "Task failed");
                let message = e.to_string();
                Err(RunnerError::Fatal {
                    kind,
                    log: collector.finish(Some(StepError::new(kind, &message))),
                    message,
                })
            }
            Err(join_error) => {
                let message = if join_error.is_panic() {
                    format!(
                        "worker panicked: {}",
                        panic_message(join_error.into_panic().as_ref())
                    )
                } else {
                    "worker task was cancelled".to_string()
                };
                warn!(error = %message, "Task worker died");
                Err(RunnerError::Fatal {
                    kind: ErrorKind::Fatal,
                    log: collector.finish(Some(StepError::new(ErrorKind::Fatal, &message))),
                    message,
                })
            }
        }
    }
}

struct InFlight {
    hop: usize,
    agent: String,
    iteration: usize,
    started_at: DateTime<Utc>,
    started: Instant,
    tool_calls: Vec<ToolCallTrace>,
}

/// Rebuilds the execution log from worker events.
struct LogCollector {
    steps: Vec<StepRecord>,
    in_flight: Option<InFlight>,
    observer: Option<mpsc::UnboundedSender<StepEvent>>,
}

impl LogCollector {
    fn new(observer: Option<mpsc::UnboundedSender<StepEvent>>) -> Self {
        Self {
            steps: Vec::new(),
            in_flight: None,
            observer,
        }
    }

    fn forward(&self, event: &StepEvent) {
        if let Some(observer) = &self.observer {
            let _ = observer.send(event.clone());
        }
    }

    fn observe(&mut self, event: StepEvent) {
        self.forward(&event);
        match event {
            StepEvent::IterationStarted {
                hop,
                agent,
                iteration,
            } => {
                self.in_flight = Some(InFlight {
                    hop,
                    agent,
                    iteration,
                    started_at: Utc::now(),
                    started: Instant::now(),
                    tool_calls: Vec::new(),
                });
            }
            StepEvent::ToolCompleted { trace, .. } => {
                if let Some(in_flight) = &mut self.in_flight {
                    in_flight.tool_calls.push(trace);
                }
            }
            StepEvent::StepRecorded(step) => {
                self.in_flight = None;
                self.steps.push(step);
            }
            StepEvent::HandoffTaken { .. } => {}
        }
    }

    fn drain(&mut self, rx: &mut mpsc::UnboundedReceiver<StepEvent>) {
        while let Ok(event) = rx.try_recv() {
            self.observe(event);
        }
    }

    /// Closes the in-flight iteration, if any, with `interruption`.
    fn finish(mut self, interruption: Option<StepError>) -> ExecutionLog {
        if let (Some(in_flight), Some(error)) = (self.in_flight.take(), interruption) {
            let mut step =
                StepRecord::interrupted(in_flight.hop, in_flight.iteration, in_flight.agent, error);
            step.started_at = in_flight.started_at;
            step.duration_ms = in_flight.started.elapsed().as_millis() as u64;
            step.tool_calls = in_flight.tool_calls;
            self.forward(&StepEvent::StepRecorded(step.clone()));
            self.steps.push(step);
        }
        ExecutionLog::from(self.steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::state::RunStatus;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn output() -> RunOutput {
        RunOutput {
            status: RunStatus::Completed,
            final_answer: Some("ok".into()),
            final_agent: "A".into(),
            log: ExecutionLog::new(),
            failure: None,
        }
    }

    #[tokio::test]
    async fn test_finishes_before_deadline() {
        let runner = IsolatedRunner::new(Duration::from_secs(1));
        let result = runner
            .run_with_timeout(|_scope| async { Ok::<_, crate::Error>(output()) }, None)
            .await
            .unwrap();
        assert_eq!(result.final_answer.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_timeout_aborts_uncooperative_worker() {
        let counter = Arc::new(AtomicUsize::new(0));
        let ticks = counter.clone();
        let runner = IsolatedRunner::new(Duration::from_millis(50));

        let started = Instant::now();
        let err = runner
            .run_with_timeout(
                move |_scope| async move {
                    while ticks.fetch_add(1, Ordering::SeqCst) < 10_000 {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                    }
                    Ok::<_, crate::Error>(output())
                },
                None,
            )
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_millis(150));
        assert_eq!(err.kind(), ErrorKind::Timeout);
        let seen = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(counter.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn test_timeout_keeps_partial_log() {
        let runner = IsolatedRunner::new(Duration::from_millis(50));
        let (observer, mut observed) = mpsc::unbounded_channel();

        let err = runner
            .run_with_timeout(
                |scope: WorkerScope| async move {
                    scope.events.emit(StepEvent::IterationStarted {
                        hop: 0,
                        agent: "A".into(),
                        iteration: 1,
                    });
                    scope
                        .events
                        .emit(StepEvent::StepRecorded(StepRecord::new(0, 1, "A")));
                    scope.events.emit(StepEvent::IterationStarted {
                        hop: 0,
                        agent: "A".into(),
                        iteration: 2,
                    });
                    scope.cancel.cancelled().await;
                    Err::<RunOutput, _>(crate::Error::Cancelled)
                },
                Some(observer),
            )
            .await
            .unwrap_err();

        let log = err.into_log();
        assert_eq!(log.len(), 2);
        assert!(!log.steps()[0].has_error());
        let interrupted = &log.steps()[1];
        assert_eq!(interrupted.iteration, 2);
        assert_eq!(interrupted.error.as_ref().unwrap().kind, ErrorKind::Timeout);

        let mut count = 0;
        while observed.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 4);
    }

    #[tokio::test]
    async fn test_worker_error_and_panic_are_fatal() {
        let runner = IsolatedRunner::new(Duration::from_secs(1));
        let err = runner
            .run_with_timeout(
                |_scope| async { Err::<RunOutput, _>(crate::Error::TooManyHandoffs { limit: 2 }) },
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TooManyHandoffs);

        let err = runner
            .run_with_timeout(
                |_scope| async {
                    if true {
                        panic!("worker blew up");
                    }
                    Ok::<_, crate::Error>(output())
                },
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fatal);
        assert!(err.to_string().contains("worker panicked: worker blew up"));
    }
}
