use crate::adapters::llm::{LLMAdapter, LLMRequest, LLMResponse, ModelConfig, Usage};
use crate::errors::{ReviewError, ReviewResult};
use crate::http::{build_client, send_with_retry};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Chat-completions client, shared by OpenAI and DeepSeek models.
pub struct OpenAIAdapter {
    client: Client,
    config: ModelConfig,
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: usize,
    top_p: f32,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
    usage: Option<OpenAIUsage>,
    model: String,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

impl OpenAIAdapter {
    pub fn new(config: ModelConfig) -> ReviewResult<Self> {
        let client = build_client(config.timeout)
            .map_err(|e| ReviewError::provider(config.provider.name(), e.to_string()))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl LLMAdapter for OpenAIAdapter {
    async fn complete(&self, request: LLMRequest) -> ReviewResult<LLMResponse> {
        let provider = self.config.provider.name();
        let messages = vec![
            Message {
                role: "system".to_string(),
                content: Some(request.system_prompt),
            },
            Message {
                role: "user".to_string(),
                content: Some(request.user_prompt),
            },
        ];

        let openai_request = OpenAIRequest {
            model: self.config.model_name.clone(),
            messages,
            temperature: request.temperature.unwrap_or(self.config.temperature),
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            top_p: 1.0,
        };

        let url = format!("{}/chat/completions", self.config.base_url);
        let response = send_with_retry(|| {
            self.client
                .post(&url)
                .bearer_auth(&self.config.api_key)
                .json(&openai_request)
        })
        .await
        .map_err(|e| ReviewError::provider(provider, e.to_string()))?;

        let openai_response: OpenAIResponse = response.json().await.map_err(|e| {
            ReviewError::provider(provider, format!("unreadable response body: {}", e))
        })?;

        let content = openai_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ReviewError::provider(provider, "response contained no choices"))?;

        Ok(LLMResponse {
            content: content.trim().to_string(),
            model: openai_response.model,
            usage: openai_response.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}
