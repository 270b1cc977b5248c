//! Runtime configuration with defaults.
//!
//! [`AgentDefaults`] is what every step falls back to when its agent does not
//! override model, temperature or max tokens. [`ConciergeConfig`] wraps it with
//! the search-workflow switches and reads overrides from the environment.

use crate::api::retry::RetryConfig;
use crate::{DEFAULT_MODEL, Error};
use tracing::warn;

/// Per-call defaults shared by every step of a workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentDefaults {
    /// Model identifier. Default: `"google/gemini-2.0-flash-001"`.
    pub model: String,
    /// Maximum tokens per response. Default: `4096`.
    pub max_tokens: u32,
    /// Sampling temperature. Default: `0.7`.
    pub temperature: f32,
    /// Retry policy for transient failures. Default: 2 retries.
    pub retry: RetryConfig,
    /// Prepended to every agent's system prompt.
    pub global_instruction: Option<String>,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            retry: RetryConfig::default(),
            global_instruction: None,
        }
    }
}

impl AgentDefaults {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_global_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.global_instruction = Some(instruction.into());
        self
    }
}

/// Top-level configuration for the CLI and the web service.
#[derive(Debug, Clone, PartialEq)]
pub struct ConciergeConfig {
    pub defaults: AgentDefaults,
    /// Query the live web-search plugin instead of the fixed venue table.
    /// Default: `false`.
    pub live_search: bool,
    /// Number of venues the selection step keeps. Default: `5`.
    pub top_n: usize,
    /// `HTTP-Referer` header sent to OpenRouter.
    pub referer: String,
    /// `X-Title` header sent to OpenRouter.
    pub title: String,
}

impl Default for ConciergeConfig {
    fn default() -> Self {
        Self {
            defaults: AgentDefaults::default(),
            live_search: false,
            top_n: 5,
            referer: "https://github.com/concierge-rs".to_string(),
            title: "concierge-rs".to_string(),
        }
    }
}

impl ConciergeConfig {
    /// Defaults overridden by `CONCIERGE_MODEL`, `CONCIERGE_LIVE_SEARCH`,
    /// `CONCIERGE_TOP_N` and `CONCIERGE_MAX_RETRIES`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads variables through `lookup`.
    /// Unparseable values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(model) = lookup("CONCIERGE_MODEL").filter(|m| !m.trim().is_empty()) {
            config.defaults.model = model.trim().to_string();
        }
        if let Some(raw) = lookup("CONCIERGE_LIVE_SEARCH") {
            match parse_bool(&raw) {
                Some(v) => config.live_search = v,
                None => warn!("Ignoring CONCIERGE_LIVE_SEARCH={raw:?}: expected a boolean"),
            }
        }
        if let Some(raw) = lookup("CONCIERGE_TOP_N") {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.top_n = n,
                _ => warn!("Ignoring CONCIERGE_TOP_N={raw:?}: expected a positive integer"),
            }
        }
        if let Some(raw) = lookup("CONCIERGE_MAX_RETRIES") {
            match raw.trim().parse::<u32>() {
                Ok(n) => config.defaults.retry.max_retries = n,
                Err(_) => warn!("Ignoring CONCIERGE_MAX_RETRIES={raw:?}: expected an integer"),
            }
        }
        config
    }

    /// Check values that would make every workflow fail.
    pub fn validate(&self) -> Result<(), Error> {
        if self.defaults.model.trim().is_empty() {
            return Err(Error::Config("model must not be empty".into()));
        }
        if self.top_n == 0 {
            return Err(Error::Config("top_n must be at least 1".into()));
        }
        if !(0.0..=2.0).contains(&self.defaults.temperature) {
            return Err(Error::Config(format!(
                "temperature {} is outside 0.0..=2.0",
                self.defaults.temperature
            )));
        }
        Ok(())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = ConciergeConfig::default();
        assert_eq!(config.defaults.model, "google/gemini-2.0-flash-001");
        assert_eq!(config.defaults.max_tokens, 4096);
        assert!((config.defaults.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.defaults.retry.max_retries, 2);
        assert!(!config.live_search);
        assert_eq!(config.top_n, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides() {
        let config = ConciergeConfig::from_lookup(lookup(&[
            ("CONCIERGE_MODEL", "openai/gpt-4o-mini"),
            ("CONCIERGE_LIVE_SEARCH", "true"),
            ("CONCIERGE_TOP_N", "3"),
            ("CONCIERGE_MAX_RETRIES", "0"),
        ]));
        assert_eq!(config.defaults.model, "openai/gpt-4o-mini");
        assert!(config.live_search);
        assert_eq!(config.top_n, 3);
        assert_eq!(config.defaults.retry.max_retries, 0);
    }

    #[test]
    fn invalid_env_values_ignored() {
        let config = ConciergeConfig::from_lookup(lookup(&[
            ("CONCIERGE_MODEL", "  "),
            ("CONCIERGE_LIVE_SEARCH", "maybe"),
            ("CONCIERGE_TOP_N", "0"),
            ("CONCIERGE_MAX_RETRIES", "-1"),
        ]));
        assert_eq!(config, ConciergeConfig::default());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = ConciergeConfig::default();
        config.top_n = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = ConciergeConfig {
            defaults: AgentDefaults::default().with_temperature(3.5),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_methods() {
        let defaults = AgentDefaults::default()
            .with_model("m")
            .with_max_tokens(10)
            .with_retry(RetryConfig::none())
            .with_global_instruction("日本語で回答してください。");
        assert_eq!(defaults.model, "m");
        assert_eq!(defaults.max_tokens, 10);
        assert_eq!(defaults.retry.max_retries, 0);
        assert!(defaults.global_instruction.is_some());
    }
}
