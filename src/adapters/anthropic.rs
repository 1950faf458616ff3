use crate::adapters::llm::{LLMAdapter, LLMRequest, LLMResponse, ModelConfig, Usage};
use crate::errors::{ReviewError, ReviewResult};
use crate::http::{build_client, send_with_retry};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter {
    client: Client,
    config: ModelConfig,
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: usize,
    temperature: f32,
    system: Vec<SystemBlock>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

/// The system prompt is identical across every file of a run, so it is
/// marked cacheable.
#[derive(Serialize)]
struct SystemBlock {
    #[serde(rename = "type")]
    block_type: &'static str,
    text: String,
    cache_control: CacheControl,
}

#[derive(Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    control_type: &'static str,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<Content>,
    model: String,
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: usize,
    output_tokens: usize,
}

impl AnthropicAdapter {
    pub fn new(config: ModelConfig) -> ReviewResult<Self> {
        let client = build_client(config.timeout)
            .map_err(|e| ReviewError::provider(config.provider.name(), e.to_string()))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl LLMAdapter for AnthropicAdapter {
    async fn complete(&self, request: LLMRequest) -> ReviewResult<LLMResponse> {
        let provider = self.config.provider.name();
        let anthropic_request = AnthropicRequest {
            model: self.config.model_name.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: request.user_prompt,
            }],
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            temperature: request.temperature.unwrap_or(self.config.temperature),
            system: vec![SystemBlock {
                block_type: "text",
                text: request.system_prompt,
                cache_control: CacheControl {
                    control_type: "ephemeral",
                },
            }],
        };

        let url = format!("{}/messages", self.config.base_url);
        let response = send_with_retry(|| {
            self.client
                .post(&url)
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&anthropic_request)
        })
        .await
        .map_err(|e| ReviewError::provider(provider, e.to_string()))?;

        let anthropic_response: AnthropicResponse = response.json().await.map_err(|e| {
            ReviewError::provider(provider, format!("unreadable response body: {}", e))
        })?;

        let content = anthropic_response
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(LLMResponse {
            content: content.trim().to_string(),
            model: anthropic_response.model,
            usage: anthropic_response.usage.map(|u| Usage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
                total_tokens: u.input_tokens + u.output_tokens,
            }),
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}
