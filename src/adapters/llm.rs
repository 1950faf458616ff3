use crate::config::{BaseUrls, Config};
use crate::errors::{ReviewError, ReviewResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provider {
    OpenAi,
    Anthropic,
    Google,
    DeepSeek,
}

// Checked in order; the first matching prefix wins.
const PREFIXES: [(&str, Provider); 5] = [
    ("gpt-", Provider::OpenAi),
    ("o1-", Provider::OpenAi),
    ("claude-", Provider::Anthropic),
    ("gemini-", Provider::Google),
    ("deepseek-", Provider::DeepSeek),
];

impl Provider {
    pub fn from_model(model: &str) -> ReviewResult<Self> {
        PREFIXES
            .iter()
            .find(|(prefix, _)| model.starts_with(prefix))
            .map(|(_, provider)| *provider)
            .ok_or_else(|| ReviewError::UnsupportedModel(model.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
            Provider::DeepSeek => "deepseek",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::Anthropic => "https://api.anthropic.com/v1",
            Provider::Google => "https://generativelanguage.googleapis.com/v1beta",
            Provider::DeepSeek => "https://api.deepseek.com/v1",
        }
    }

    fn configured_base_url<'a>(&self, urls: &'a BaseUrls) -> Option<&'a String> {
        match self {
            Provider::OpenAi => urls.openai.as_ref(),
            Provider::Anthropic => urls.anthropic.as_ref(),
            Provider::Google => urls.google.as_ref(),
            Provider::DeepSeek => urls.deepseek.as_ref(),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub provider: Provider,
    pub model_name: String,
    pub api_key: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout: Duration,
}

impl ModelConfig {
    /// Resolves the provider for `model` and pairs it with a non-empty key.
    pub fn resolve(model: &str, api_key: &str, config: &Config) -> ReviewResult<Self> {
        let provider = Provider::from_model(model)?;
        if api_key.trim().is_empty() {
            return Err(ReviewError::Config(format!(
                "no API key provided for {} model {}",
                provider, model
            )));
        }

        let base_url = provider
            .configured_base_url(&config.base_urls)
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| provider.default_base_url().to_string());

        Ok(Self {
            provider,
            model_name: model.to_string(),
            api_key: api_key.trim().to_string(),
            base_url,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.request_timeout(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub model: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn complete(&self, request: LLMRequest) -> ReviewResult<LLMResponse>;
    fn model_name(&self) -> &str;
}

pub fn create_adapter(config: &ModelConfig) -> ReviewResult<Box<dyn LLMAdapter>> {
    match config.provider {
        // DeepSeek speaks the OpenAI chat-completions dialect.
        Provider::OpenAi | Provider::DeepSeek => {
            Ok(Box::new(crate::adapters::OpenAIAdapter::new(config.clone())?))
        }
        Provider::Anthropic => Ok(Box::new(crate::adapters::AnthropicAdapter::new(
            config.clone(),
        )?)),
        Provider::Google => Ok(Box::new(crate::adapters::GeminiAdapter::new(config.clone())?)),
    }
}
