//! Runner configuration loaded from TOML.

use std::path::Path;

use messages::{MessageParam, MessageRequest};
use serde::Deserialize;

/// Request parameters and loop limits for a run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    /// Model to use.
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum tokens per response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Maximum model calls per run. Zero means unbounded.
    #[serde(default)]
    pub max_iterations: usize,

    /// System prompt sent with every request.
    pub system: Option<String>,

    pub temperature: Option<f32>,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            max_iterations: 0,
            system: None,
            temperature: None,
        }
    }
}

impl RunnerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Build the request template for a run starting from `messages`.
    pub fn request(&self, messages: Vec<MessageParam>) -> MessageRequest {
        let mut request = MessageRequest::new(&self.model, self.max_tokens).messages(messages);
        request.system = self.system.clone();
        request.temperature = self.temperature;
        request
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),
}
