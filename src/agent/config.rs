//! Execution limits and model settings for agent runs.

use std::time::Duration;

use crate::client::DEFAULT_MODEL;

pub const DEFAULT_MAX_ITERATIONS: usize = 5;
pub const DEFAULT_MAX_HANDOFFS: usize = 10;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_TEARDOWN_GRACE: Duration = Duration::from_millis(25);
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Execution behavior configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    /// Model used by agents that do not name their own
    pub model: String,
    /// Reasoning loop iterations per agent hop
    pub max_iterations: usize,
    /// Handoffs allowed in one task before it fails
    pub max_handoffs: usize,
    /// Wall-clock limit for one isolated task run
    pub timeout: Duration,
    /// How long a timed-out worker may take to observe cancellation before it is aborted
    pub teardown_grace: Duration,
    pub temperature: Option<f32>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_handoffs: DEFAULT_MAX_HANDOFFS,
            timeout: DEFAULT_TIMEOUT,
            teardown_grace: DEFAULT_TEARDOWN_GRACE,
            temperature: Some(DEFAULT_TEMPERATURE),
        }
    }
}

impl ExecutionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_max_handoffs(mut self, max_handoffs: usize) -> Self {
        self.max_handoffs = max_handoffs;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_teardown_grace(mut self, grace: Duration) -> Self {
        self.teardown_grace = grace;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.max_iterations == 0 {
            return Err(crate::Error::Config(
                "max_iterations must be at least 1".into(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(crate::Error::Config("timeout must be non-zero".into()));
        }
        if self.model.trim().is_empty() {
            return Err(crate::Error::Config("model must not be empty".into()));
        }
        Ok(())
    }
}
