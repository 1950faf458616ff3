use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unsupported model: {0} (expected a gpt-, o1-, claude-, gemini- or deepseek- model)")]
    UnsupportedModel(String),

    #[error("{provider} request failed: {message}")]
    ProviderCall { provider: String, message: String },

    #[error("failed to parse model response: {0}")]
    Parse(String),

    #[error("hosting API error: {0}")]
    Hosting(String),

    #[error("event payload error: {0}")]
    Event(String),
}

impl ReviewError {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderCall {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

pub type ReviewResult<T> = std::result::Result<T, ReviewError>;
