use crate::adapters::llm::{LLMAdapter, LLMRequest, LLMResponse, ModelConfig, Usage};
use crate::errors::{ReviewError, ReviewResult};
use crate::http::{build_client, send_with_retry};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Google `generateContent` client.
pub struct GeminiAdapter {
    client: Client,
    config: ModelConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
    #[serde(default)]
    total_token_count: usize,
}

impl GeminiAdapter {
    pub fn new(config: ModelConfig) -> ReviewResult<Self> {
        let client = build_client(config.timeout)
            .map_err(|e| ReviewError::provider(config.provider.name(), e.to_string()))?;

        Ok(Self { client, config })
    }
}

fn text_content(role: Option<&str>, text: String) -> GeminiContent {
    GeminiContent {
        role: role.map(str::to_string),
        parts: vec![GeminiPart { text: Some(text) }],
    }
}

#[async_trait]
impl LLMAdapter for GeminiAdapter {
    async fn complete(&self, request: LLMRequest) -> ReviewResult<LLMResponse> {
        let provider = self.config.provider.name();
        let gemini_request = GeminiRequest {
            system_instruction: text_content(None, request.system_prompt),
            contents: vec![text_content(Some("user"), request.user_prompt)],
            generation_config: GenerationConfig {
                temperature: request.temperature.unwrap_or(self.config.temperature),
                max_output_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            },
        };

        // Key goes in a header so it never shows up in logged URLs.
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model_name
        );
        let response = send_with_retry(|| {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.config.api_key)
                .json(&gemini_request)
        })
        .await
        .map_err(|e| ReviewError::provider(provider, e.to_string()))?;

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            ReviewError::provider(provider, format!("unreadable response body: {}", e))
        })?;

        let candidate = gemini_response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .ok_or_else(|| ReviewError::provider(provider, "response contained no candidates"))?;

        let content = candidate
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join("\n");

        Ok(LLMResponse {
            content: content.trim().to_string(),
            model: gemini_response
                .model_version
                .unwrap_or_else(|| self.config.model_name.clone()),
            usage: gemini_response.usage_metadata.map(|u| Usage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            }),
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::llm::Provider;
    use mockito::Matcher;
    use std::time::Duration;

    fn adapter(base_url: String) -> GeminiAdapter {
        GeminiAdapter::new(ModelConfig {
            provider: Provider::Google,
            model_name: "gemini-1.5-pro".to_string(),
            api_key: "g-key".to_string(),
            base_url,
            temperature: 0.2,
            max_tokens: 2048,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn request() -> LLMRequest {
        LLMRequest {
            system_prompt: "sys".to_string(),
            user_prompt: "user".to_string(),
            temperature: None,
            max_tokens: None,
        }
    }

    #[tokio::test]
    async fn joins_candidate_parts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-1.5-pro:generateContent")
            .match_header("x-goog-api-key", "g-key")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "systemInstruction": {"parts": [{"text": "sys"}]},
                "contents": [{"role": "user", "parts": [{"text": "user"}]}],
                "generationConfig": {"maxOutputTokens": 2048}
            })))
            .with_status(200)
            .with_body(
                r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"part one"},{"text":"part two"}]}}],"usageMetadata":{"promptTokenCount":5,"candidatesTokenCount":4,"totalTokenCount":9}}"#,
            )
            .create_async()
            .await;

        let response = adapter(server.url()).complete(request()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.content, "part one\npart two");
        assert_eq!(response.model, "gemini-1.5-pro");
        assert_eq!(response.usage.unwrap().total_tokens, 9);
    }

    #[tokio::test]
    async fn missing_candidates_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/models/gemini-1.5-pro:generateContent")
            .with_status(200)
            .with_body(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#)
            .create_async()
            .await;

        let err = adapter(server.url()).complete(request()).await.unwrap_err();
        assert!(err.to_string().contains("no candidates"));
    }
}
