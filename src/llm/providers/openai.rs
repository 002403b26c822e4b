//! OpenAI Chat Completions provider.
//!
//! Implements the structured-output request/response contract from
//! spec.md §4.3 over OpenAI's Chat Completions endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{CompletionRequest, CompletionResponse, Provider, ProviderConfig};
use crate::llm::retry::{calculate_delay, classify_error_message, classify_status, ErrorClass, RetryConfig};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

pub struct OpenAiProvider {
    client: Client,
    config: ProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .expect("failed to build OpenAI HTTP client");
        Self { client, config }
    }

    fn build_request(&self, req: &CompletionRequest) -> OpenAiRequest {
        OpenAiRequest {
            model: self.config.model.clone(),
            messages: vec![
                OpenAiMessage {
                    role: "system".to_string(),
                    content: req.system_prompt.clone(),
                },
                OpenAiMessage {
                    role: "user".to_string(),
                    content: req.user_prompt.clone(),
                },
            ],
            max_tokens: Some(req.max_tokens),
            temperature: Some(req.temperature),
            seed: Some(req.seed),
            response_format: Some(OpenAiResponseFormat {
                format_type: "json_object".to_string(),
            }),
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(&self, req: &CompletionRequest) -> Result<CompletionResponse, String> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| "OpenAI API key not configured".to_string())?;

        let body = self.build_request(req);
        let retry_config = RetryConfig::default();
        let mut last_error = String::new();

        for attempt in 0..retry_config.max_attempts {
            let response = self
                .client
                .post(OPENAI_API_URL)
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        let text = resp
                            .text()
                            .await
                            .map_err(|e| format!("failed to read response: {e}"))?;

                        let parsed: OpenAiResponse = serde_json::from_str(&text).map_err(|e| {
                            format!(
                                "failed to parse OpenAI response: {e} - body: {}",
                                &text[..text.len().min(500)]
                            )
                        })?;

                        let content = parsed
                            .choices
                            .into_iter()
                            .next()
                            .map(|c| c.message.content)
                            .ok_or_else(|| "OpenAI response contained no choices".to_string())?;

                        return Ok(CompletionResponse {
                            content,
                            model: parsed.model,
                            tokens_used: parsed.usage.map(|u| u.total_tokens as i64),
                        });
                    }

                    let body_text = resp.text().await.unwrap_or_default();

                    match classify_status(status.as_u16()) {
                        ErrorClass::Retryable if attempt < retry_config.max_attempts - 1 => {
                            let delay = calculate_delay(attempt, &retry_config);
                            tracing::warn!(
                                status = status.as_u16(),
                                attempt = attempt + 1,
                                max_attempts = retry_config.max_attempts,
                                "OpenAI request failed, retrying"
                            );
                            last_error = format!("HTTP {status}: {}", &body_text[..body_text.len().min(200)]);
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        _ => {
                            if let Ok(err) = serde_json::from_str::<OpenAiErrorResponse>(&body_text) {
                                return Err(format!(
                                    "OpenAI API error: {} - {}",
                                    err.error.error_type, err.error.message
                                ));
                            }
                            return Err(format!("OpenAI API error ({status}): {body_text}"));
                        }
                    }
                }
                Err(e) => {
                    let msg = e.to_string();
                    match classify_error_message(&msg) {
                        ErrorClass::Retryable if attempt < retry_config.max_attempts - 1 => {
                            let delay = calculate_delay(attempt, &retry_config);
                            tracing::warn!(attempt = attempt + 1, error = %e, "OpenAI request failed, retrying");
                            last_error = msg;
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        _ => return Err(format!("request failed: {e}")),
                    }
                }
            }
        }

        tracing::error!(max_attempts = retry_config.max_attempts, "OpenAI retries exhausted");
        Err(format!("max retries exceeded. last error: {last_error}"))
    }

    fn name(&self) -> &'static str {
        "openai"
    }

    fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }
}

// ============================================================================
// API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAiResponseFormat>,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OpenAiResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: String,
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_name_and_configuration() {
        let configured = OpenAiProvider::new(ProviderConfig {
            api_key: Some("sk-test".to_string()),
            model: "gpt-4o".to_string(),
        });
        assert_eq!(configured.name(), "openai");
        assert!(configured.is_configured());

        let unconfigured = OpenAiProvider::new(ProviderConfig::default());
        assert!(!unconfigured.is_configured());
    }

    #[test]
    fn build_request_carries_seed_and_json_mode() {
        let provider = OpenAiProvider::new(ProviderConfig {
            api_key: Some("sk-test".to_string()),
            model: "gpt-4o".to_string(),
        });
        let req = CompletionRequest {
            system_prompt: "system".to_string(),
            user_prompt: "user".to_string(),
            temperature: 0.2,
            max_tokens: 512,
            seed: 42,
        };
        let body = provider.build_request(&req);
        assert_eq!(body.model, "gpt-4o");
        assert_eq!(body.seed, Some(42));
        assert_eq!(body.messages.len(), 2);
        assert_eq!(body.messages[0].role, "system");
        assert_eq!(
            body.response_format.unwrap().format_type,
            "json_object".to_string()
        );
    }
}
