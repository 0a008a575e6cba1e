//! Settings file and environment loading.
//!
//! Sources, lowest to highest priority:
//! 1. Built-in defaults
//! 2. JSON settings file
//! 3. `AGENT_RELAY_*` environment variables (`OPENAI_API_KEY` / `OPENAI_BASE_URL`
//!    as fallbacks for the credential and endpoint)

use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::env::EnvSource;
use super::{ConfigError, ConfigResult};
use crate::agent::{
    DEFAULT_MAX_HANDOFFS, DEFAULT_MAX_ITERATIONS, DEFAULT_TEARDOWN_GRACE, DEFAULT_TEMPERATURE,
    DEFAULT_TIMEOUT, ExecutionConfig,
};
use crate::client::{DEFAULT_MODEL, OpenAiClient};

/// Settings as they appear on disk. Every field is optional so a file can
/// override just what it needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SettingsFile {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    max_iterations: Option<usize>,
    #[serde(default)]
    max_handoffs: Option<usize>,
    #[serde(default)]
    timeout_ms: Option<u64>,
    #[serde(default)]
    teardown_grace_ms: Option<u64>,
    #[serde(default)]
    temperature: Option<f32>,
    #[serde(default)]
    request_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub max_iterations: usize,
    pub max_handoffs: usize,
    pub timeout: Duration,
    pub teardown_grace: Duration,
    pub temperature: Option<f32>,
    /// HTTP timeout of a single completion call.
    pub request_timeout: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: None,
            api_key: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_handoffs: DEFAULT_MAX_HANDOFFS,
            timeout: DEFAULT_TIMEOUT,
            teardown_grace: DEFAULT_TEARDOWN_GRACE,
            temperature: Some(DEFAULT_TEMPERATURE),
            request_timeout: None,
        }
    }
}

impl Settings {
    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(&EnvSource::default())?;
        Ok(settings)
    }

    /// Defaults overridden by a JSON file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let file: SettingsFile = serde_json::from_str(content)?;
        let mut settings = Self::default();
        settings.merge_file(file);
        Ok(settings)
    }

    /// Defaults overridden by `source`.
    pub fn from_env(source: &EnvSource) -> ConfigResult<Self> {
        let mut settings = Self::default();
        settings.apply_env(source)?;
        Ok(settings)
    }

    fn merge_file(&mut self, file: SettingsFile) {
        if let Some(model) = file.model {
            self.model = model;
        }
        if file.base_url.is_some() {
            self.base_url = file.base_url;
        }
        if let Some(key) = file.api_key {
            self.api_key = Some(SecretString::from(key));
        }
        if let Some(max_iterations) = file.max_iterations {
            self.max_iterations = max_iterations;
        }
        if let Some(max_handoffs) = file.max_handoffs {
            self.max_handoffs = max_handoffs;
        }
        if let Some(ms) = file.timeout_ms {
            self.timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = file.teardown_grace_ms {
            self.teardown_grace = Duration::from_millis(ms);
        }
        if file.temperature.is_some() {
            self.temperature = file.temperature;
        }
        if let Some(ms) = file.request_timeout_ms {
            self.request_timeout = Some(Duration::from_millis(ms));
        }
    }

    /// Overrides fields from prefixed variables in `source`.
    pub fn apply_env(&mut self, source: &EnvSource) -> ConfigResult<()> {
        if let Some(model) = source.get("model")? {
            self.model = model;
        }
        if let Some(url) = source.get("base_url")?.or(source.var("OPENAI_BASE_URL")?) {
            self.base_url = Some(url);
        }
        if let Some(key) = source.get("api_key")? {
            self.api_key = Some(SecretString::from(key));
        } else if self.api_key.is_none()
            && let Some(key) = source.var("OPENAI_API_KEY")?
        {
            self.api_key = Some(SecretString::from(key));
        }
        if let Some(max_iterations) = source.get_parsed("max_iterations")? {
            self.max_iterations = max_iterations;
        }
        if let Some(max_handoffs) = source.get_parsed("max_handoffs")? {
            self.max_handoffs = max_handoffs;
        }
        if let Some(ms) = source.get_parsed("timeout_ms")? {
            self.timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = source.get_parsed("teardown_grace_ms")? {
            self.teardown_grace = Duration::from_millis(ms);
        }
        if let Some(temperature) = source.get_parsed("temperature")? {
            self.temperature = Some(temperature);
        }
        if let Some(ms) = source.get_parsed("request_timeout_ms")? {
            self.request_timeout = Some(Duration::from_millis(ms));
        }
        self.validate()
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_iterations == 0 {
            return Err(ConfigError::invalid("max_iterations", "must be at least 1"));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::invalid("timeout", "must be non-zero"));
        }
        if let Some(temperature) = self.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(ConfigError::invalid(
                "temperature",
                format!("{} is outside 0.0..=2.0", temperature),
            ));
        }
        Ok(())
    }

    pub fn execution_config(&self) -> crate::Result<ExecutionConfig> {
        self.validate()?;
        let config = ExecutionConfig::new()
            .with_model(&self.model)
            .with_max_iterations(self.max_iterations)
            .with_max_handoffs(self.max_handoffs)
            .with_timeout(self.timeout)
            .with_teardown_grace(self.teardown_grace)
            .with_temperature(self.temperature);
        config.validate()?;
        Ok(config)
    }

    pub fn openai_client(&self) -> crate::Result<OpenAiClient> {
        self.validate()?;
        let mut builder = OpenAiClient::builder();
        if let Some(url) = &self.base_url {
            builder = builder.base_url(url);
        }
        if let Some(key) = &self.api_key {
            builder = builder.api_key(key.clone());
        }
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        builder.build()
    }
}
