//! Environment variable source for settings.
//!
//! Reads `<PREFIX><KEY>` where `KEY` is the upper-cased settings key with
//! dots replaced by underscores. Environment variables are treated as
//! read-only; tests inject a fixed map instead of mutating the process env.

use std::collections::HashMap;
use std::str::FromStr;

use super::{ConfigError, ConfigResult};

pub const ENV_PREFIX: &str = "AGENT_RELAY_";

#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: Option<String>,
    vars: Option<HashMap<String, String>>,
}

impl EnvSource {
    /// Process environment, no prefix.
    pub fn new() -> Self {
        Self {
            prefix: None,
            vars: None,
        }
    }

    /// Process environment under `prefix`.
    pub fn prefixed(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            vars: None,
        }
    }

    /// Fixed variables instead of the process environment.
    pub fn from_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: None,
            vars: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    fn env_key(&self, key: &str) -> String {
        let key = key.to_uppercase().replace(['.', '-'], "_");
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, key),
            None => key,
        }
    }

    /// Variable named exactly `name`, ignoring the prefix.
    pub fn var(&self, name: &str) -> ConfigResult<Option<String>> {
        if let Some(vars) = &self.vars {
            return Ok(vars.get(name).cloned());
        }
        match std::env::var(name) {
            Ok(value) => Ok(Some(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(ConfigError::Env(e)),
        }
    }

    /// Prefixed variable for settings key `key`. Empty values count as unset.
    pub fn get(&self, key: &str) -> ConfigResult<Option<String>> {
        Ok(self
            .var(&self.env_key(key))?
            .filter(|value| !value.trim().is_empty()))
    }

    pub fn get_parsed<T>(&self, key: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key)? {
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|e| ConfigError::invalid(self.env_key(key), format!("{}", e))),
            None => Ok(None),
        }
    }
}

impl Default for EnvSource {
    fn default() -> Self {
        Self::prefixed(ENV_PREFIX)
    }
}
