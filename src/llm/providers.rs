//! Provider abstraction for structured-output LLM calls.

use async_trait::async_trait;

mod openai;

pub use openai::OpenAiProvider;

/// Configuration handed to a provider at construction time.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub model: String,
}

/// A single structured-output completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub seed: i64,
}

/// Raw provider response before local schema validation.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    pub tokens_used: Option<i64>,
}

#[async_trait]
pub trait Provider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, String>;
    fn name(&self) -> &'static str;
    fn is_configured(&self) -> bool;
}
