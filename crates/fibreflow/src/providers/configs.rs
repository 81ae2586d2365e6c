use anyhow::{Context, Result};
use std::env;

pub const ANTHROPIC_HOST: &str = "https://api.anthropic.com";
pub const ANTHROPIC_MODEL: &str = "claude-3-haiku-20240307";
pub const ANTHROPIC_MAX_TOKENS: i32 = 4096;

#[derive(Debug, Clone)]
pub struct AnthropicProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: i32,
    pub temperature: Option<f32>,
}

impl AnthropicProviderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            host: ANTHROPIC_HOST.to_string(),
            api_key: api_key.into(),
            model: ANTHROPIC_MODEL.to_string(),
            max_tokens: ANTHROPIC_MAX_TOKENS,
            temperature: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn from_env() -> Result<Self> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY environment variable not set")?;

        let mut config = Self::new(api_key);
        if let Ok(host) = env::var("ANTHROPIC_HOST") {
            config.host = host;
        }
        if let Ok(model) = env::var("ANTHROPIC_MODEL") {
            config.model = model;
        }
        if let Ok(max_tokens) = env::var("ANTHROPIC_MAX_TOKENS") {
            config.max_tokens = max_tokens
                .parse()
                .context("ANTHROPIC_MAX_TOKENS must be an integer")?;
        }
        Ok(config)
    }
}
