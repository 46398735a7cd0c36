// src/config/ai.rs
use serde::Deserialize;

use crate::error::ConfigError;

pub const ENV_API_KEY: &str = "DEEPSEEK_API_KEY";

fn default_endpoint() -> String {
    "https://api.deepseek.com/chat/completions".to_string()
}
fn default_model() -> String {
    "deepseek-chat".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_system_prompt() -> String {
    "You are a professional academic paper assistant who is good at summarizing and analysing papers."
        .to_string()
}

/// Settings for the chat-completions endpoint used for relevance checks and summaries.
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// "ENV" means: read from DEEPSEEK_API_KEY.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            api_key: default_api_key(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl AiConfig {
    /// Resolve the "ENV" placeholder and sanitize numeric fields. A missing key is fatal.
    pub(crate) fn resolve(mut self, lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if self.api_key.trim().eq_ignore_ascii_case("env") || self.api_key.trim().is_empty() {
            self.api_key = lookup(ENV_API_KEY)
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .ok_or(ConfigError::Missing(ENV_API_KEY))?;
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            self.temperature = default_temperature();
        }
        if self.timeout_secs == 0 {
            self.timeout_secs = default_timeout_secs();
        }
        Ok(self)
    }
}
