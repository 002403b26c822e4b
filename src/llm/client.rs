//! Structured-output LLM client (spec.md §4.3).
//!
//! Wraps a `Provider` with a client-side deadline and local schema
//! validation of the parsed JSON output before handing it to the
//! coordinator.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use super::providers::{CompletionRequest, OpenAiProvider, Provider, ProviderConfig};
use crate::error::{AppError, AppResult};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Which output contract a completion must satisfy (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedSchema {
    TreatmentSummary,
    InsuranceSummary,
}

impl ExpectedSchema {
    fn validate(&self, value: &Value) -> Result<(), String> {
        let obj = value
            .as_object()
            .ok_or_else(|| "response is not a JSON object".to_string())?;

        let non_empty_string = |key: &str| -> Result<(), String> {
            match obj.get(key).and_then(Value::as_str) {
                Some(s) if !s.is_empty() => Ok(()),
                Some(_) => Err(format!("field \"{key}\" must be non-empty")),
                None => Err(format!("field \"{key}\" is missing or not a string")),
            }
        };

        match self {
            ExpectedSchema::TreatmentSummary => {
                non_empty_string("title")?;
                non_empty_string("summary")?;
            }
            ExpectedSchema::InsuranceSummary => {
                non_empty_string("insurance_summary")?;
                match obj.get("disclaimer").and_then(Value::as_str) {
                    Some(s) if s == crate::prompts::INSURANCE_DISCLAIMER => {}
                    Some(_) => {
                        return Err("disclaimer does not match the fixed text byte-for-byte".to_string())
                    }
                    None => return Err("field \"disclaimer\" is missing".to_string()),
                }
            }
        }
        Ok(())
    }
}

/// `{parsed_output, tokens_used, elapsed_ms}` from spec.md §4.3.
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub parsed_output: Value,
    pub tokens_used: Option<i64>,
    pub elapsed_ms: i64,
    pub model_used: String,
}

pub struct LlmClient {
    provider: Arc<dyn Provider>,
    timeout: std::time::Duration,
}

impl LlmClient {
    pub fn new(api_key: String, model: String) -> Self {
        let provider = Arc::new(OpenAiProvider::new(ProviderConfig {
            api_key: Some(api_key),
            model,
        }));
        Self {
            provider,
            timeout: std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_provider(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            timeout: std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Invokes the LLM and validates the parsed output against `schema`.
    /// Network failures, schema-parse failures, and non-conforming output
    /// all surface as `AppError::LLMCallFailed`; deadline expiry surfaces
    /// as `AppError::LLMTimeout`.
    pub async fn generate(
        &self,
        request: CompletionRequest,
        schema: ExpectedSchema,
    ) -> AppResult<CompletionOutcome> {
        let started = Instant::now();

        let response = tokio::time::timeout(self.timeout, self.provider.complete(&request))
            .await
            .map_err(|_| AppError::LLMTimeout)?
            .map_err(AppError::LLMCallFailed)?;

        let json_str = super::json_extract::extract_json(&response.content)
            .map_err(AppError::LLMCallFailed)?;
        let parsed: Value = serde_json::from_str(json_str)
            .map_err(|e| AppError::LLMCallFailed(format!("invalid JSON from LLM: {e}")))?;

        schema.validate(&parsed).map_err(AppError::LLMCallFailed)?;

        Ok(CompletionOutcome {
            parsed_output: parsed,
            tokens_used: response.tokens_used,
            elapsed_ms: started.elapsed().as_millis() as i64,
            model_used: response.model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::providers::CompletionResponse;
    use async_trait::async_trait;

    struct StubProvider {
        content: String,
    }

    #[async_trait]
    impl Provider for StubProvider {
        async fn complete(&self, _req: &CompletionRequest) -> Result<CompletionResponse, String> {
            Ok(CompletionResponse {
                content: self.content.clone(),
                model: "stub-model".to_string(),
                tokens_used: Some(123),
            })
        }
        fn name(&self) -> &'static str {
            "stub"
        }
        fn is_configured(&self) -> bool {
            true
        }
    }

    fn req() -> CompletionRequest {
        CompletionRequest {
            system_prompt: "sys".to_string(),
            user_prompt: "user".to_string(),
            temperature: 0.0,
            max_tokens: 100,
            seed: 42,
        }
    }

    #[tokio::test]
    async fn validates_treatment_summary_schema() {
        let client = LlmClient::with_provider(Arc::new(StubProvider {
            content: r#"{"title": "t", "summary": "s"}"#.to_string(),
        }));
        let outcome = client
            .generate(req(), ExpectedSchema::TreatmentSummary)
            .await
            .unwrap();
        assert_eq!(outcome.parsed_output["title"], "t");
        assert_eq!(outcome.tokens_used, Some(123));
    }

    #[tokio::test]
    async fn rejects_missing_required_field() {
        let client = LlmClient::with_provider(Arc::new(StubProvider {
            content: r#"{"title": "t"}"#.to_string(),
        }));
        let err = client
            .generate(req(), ExpectedSchema::TreatmentSummary)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::LLMCallFailed(_)));
    }

    #[tokio::test]
    async fn insurance_schema_requires_exact_disclaimer() {
        let client = LlmClient::with_provider(Arc::new(StubProvider {
            content: format!(
                r#"{{"insurance_summary": "s", "disclaimer": "{}"}}"#,
                crate::prompts::INSURANCE_DISCLAIMER
            ),
        }));
        let outcome = client
            .generate(req(), ExpectedSchema::InsuranceSummary)
            .await
            .unwrap();
        assert_eq!(outcome.parsed_output["disclaimer"], crate::prompts::INSURANCE_DISCLAIMER);

        let client = LlmClient::with_provider(Arc::new(StubProvider {
            content: r#"{"insurance_summary": "s", "disclaimer": "wrong"}"#.to_string(),
        }));
        let err = client
            .generate(req(), ExpectedSchema::InsuranceSummary)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::LLMCallFailed(_)));
    }

    #[tokio::test]
    async fn extracts_json_from_markdown_fence() {
        let client = LlmClient::with_provider(Arc::new(StubProvider {
            content: "```json\n{\"title\": \"t\", \"summary\": \"s\"}\n```".to_string(),
        }));
        let outcome = client
            .generate(req(), ExpectedSchema::TreatmentSummary)
            .await
            .unwrap();
        assert_eq!(outcome.parsed_output["summary"], "s");
    }
}
