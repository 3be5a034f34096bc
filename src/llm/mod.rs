//! Chat-completion client used by the eligibility judge

mod openai;

pub use openai::OpenAiClient;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API key environment variable {0} is not set or empty")]
    MissingApiKey(String),

    #[error("Provider returned no content: {0}")]
    EmptyReply(String),

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),
}

/// A system + user prompt pair in, reply text out
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError>;

    fn model_name(&self) -> &str;
}

/// Trim whitespace and a surrounding markdown code fence (```json ... ```)
pub fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let inner = inner.strip_suffix("```").unwrap_or(inner);
    let inner = inner
        .strip_prefix("json")
        .or_else(|| inner.strip_prefix("JSON"))
        .unwrap_or(inner);
    inner.trim()
}
