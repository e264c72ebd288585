//! Runtime configuration.
//!
//! ```yaml
//! model: gpt-4o-mini
//! temperature: 0.7
//! max_tokens: 1024
//! timeout: 30s
//! mode: json_schema      # or json_object
//! policy: strict         # or degrade
//! base_url: https://api.openai.com/v1
//! ```

use serde::{Deserialize, Serialize};
use sieve_core::DegradePolicy;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::providers::{CompletionConfig, ResponseFormat};

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Errors loading or checking configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// How structured output is requested from the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// `response_format: json_object`; the prompt describes the fields and the
    /// reply is guaranteed JSON but not guaranteed to match
    JsonObject,
    /// `response_format: json_schema` with `strict: true`
    #[default]
    JsonSchema,
}

impl OutputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::JsonObject => "json_object",
            OutputMode::JsonSchema => "json_schema",
        }
    }
}

/// Configuration for structured requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Model to use (e.g., "gpt-4o-mini")
    pub model: String,

    pub temperature: f32,

    /// Maximum tokens per completion
    pub max_tokens: u32,

    /// Request timeout, e.g. "30s" or "1m 30s"
    #[serde(with = "humantime_duration")]
    pub timeout: Duration,

    pub mode: OutputMode,

    /// What to do with replies that fail validation
    pub policy: DegradePolicy,

    pub base_url: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            timeout: Duration::from_secs(30),
            mode: OutputMode::default(),
            policy: DegradePolicy::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Create a default config for the specified model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_policy(mut self, policy: DegradePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Parse a config from YAML; omitted keys take their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Check values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be between 0 and 2, got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be positive".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid("timeout must be positive".to_string()));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::Invalid(
                "base_url must start with http:// or https://".to_string(),
            ));
        }
        Ok(())
    }

    /// Completion settings for one request.
    pub fn completion_config(&self, response_format: ResponseFormat) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.timeout,
            response_format,
        }
    }
}

mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}
