//! Generation coordinator: the state machine from spec.md §4.4/§5.
//!
//! `Received -> Authenticated -> Validated -> [SeedResolved, CodesSelected,
//! Prompted, LLMReturned] -> Audited -> Responded`, with any failure
//! transitioning to `FailedAudited -> Responded`. Authentication and
//! request decoding happen in the HTTP layer; this module starts at
//! "Validated" and owns everything from seed resolution through the
//! audit write.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audit_store::{AuditStatus, AuditStore, NewAuditRecord};
use crate::code_store::CodeStore;
use crate::config::Settings;
use crate::domain::{
    AgeGroup, ArchArea, AttachmentsLevel, Audience, CaseDifficulty, CaseTier, DiagnosticAssets, DocumentKind,
    InsuranceTier, MonitoringApproach, Tone,
};
use crate::error::{AppError, AppResult};
use crate::llm::{CompletionRequest, ExpectedSchema, LlmClient};
use crate::prompts;
use crate::redaction;
use crate::schema_registry;
use crate::selector::{self, SelectionResult};

const TREATMENT_TEMPERATURE: f32 = 0.7;
const TREATMENT_MAX_TOKENS: u32 = 1024;
const INSURANCE_TEMPERATURE: f32 = 0.2;
const INSURANCE_MAX_TOKENS: u32 = 768;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TreatmentRequest {
    pub tier: Option<CaseTier>,
    pub patient_age: Option<u32>,
    pub patient_name: Option<String>,
    pub practice_name: Option<String>,
    #[serde(default = "default_treatment_type")]
    pub treatment_type: String,
    #[serde(default)]
    pub area_treated: ArchArea,
    #[serde(default = "default_duration_range")]
    pub duration_range: String,
    pub case_difficulty: Option<CaseDifficulty>,
    pub monitoring_approach: Option<MonitoringApproach>,
    pub attachments: Option<AttachmentsLevel>,
    pub whitening_included: Option<bool>,
    pub dentist_note: Option<String>,
    #[serde(default)]
    pub audience: Audience,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default)]
    pub is_regeneration: bool,
    pub previous_version_uuid: Option<String>,
}

fn default_treatment_type() -> String {
    "clear aligners".to_string()
}

fn default_duration_range() -> String {
    "4-6 months".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InsuranceRequest {
    pub tier: Option<InsuranceTier>,
    pub arches: Option<ArchArea>,
    pub age_group: Option<AgeGroup>,
    pub retainers_included: Option<bool>,
    #[serde(default)]
    pub diagnostic_assets: DiagnosticAssets,
    pub monitoring_approach: Option<MonitoringApproach>,
    pub notes: Option<String>,
    #[serde(default)]
    pub is_regeneration: bool,
    pub previous_version_uuid: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentDocument {
    pub title: String,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CdtSelection {
    pub primary_code: String,
    pub primary_description: String,
    pub suggested_add_ons: Vec<String>,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreatmentMetadata {
    pub tokens_used: Option<i64>,
    pub generation_time_ms: i64,
    pub audience: &'static str,
    pub tone: &'static str,
    pub seed: i64,
    pub document_version: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreatmentResponse {
    pub success: bool,
    pub document: TreatmentDocument,
    pub cdt_codes: CdtSelection,
    pub metadata: TreatmentMetadata,
    pub uuid: String,
    pub is_regenerated: bool,
    pub previous_version_uuid: Option<String>,
    pub seed: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsuranceDocument {
    pub insurance_summary: String,
    pub disclaimer: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InsuranceCdtCode {
    pub code: String,
    pub description: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InsuranceMetadata {
    pub tokens_used: Option<i64>,
    pub generation_time_ms: i64,
    pub seed: i64,
    pub document_version: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct InsuranceResponse {
    pub success: bool,
    pub document: InsuranceDocument,
    pub cdt_codes: Vec<InsuranceCdtCode>,
    pub metadata: InsuranceMetadata,
    pub uuid: String,
    pub is_regenerated: bool,
    pub previous_version_uuid: Option<String>,
    pub seed: i64,
}

pub struct Coordinator {
    code_store: CodeStore,
    audit_store: AuditStore,
    llm_client: LlmClient,
    settings: Arc<Settings>,
}

impl Coordinator {
    pub fn new(
        code_store: CodeStore,
        audit_store: AuditStore,
        llm_client: LlmClient,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            code_store,
            audit_store,
            llm_client,
            settings,
        }
    }

    fn redacted_input(&self, value: &Value) -> Value {
        redaction::apply_policy(
            value,
            self.settings.store_full_audit_data,
            self.settings.redact_phi_fields,
            &self.settings.phi_fields_to_redact,
        )
    }

    /// Seed resolution per spec.md §4.4: fresh seed for initial requests,
    /// `parent.seed + 1` for regenerations, enforcing I5's kind/user match.
    async fn resolve_seed(
        &self,
        kind: DocumentKind,
        user_id: &str,
        is_regeneration: bool,
        previous_version_uuid: Option<&str>,
    ) -> AppResult<(i64, bool, Option<String>)> {
        if !is_regeneration {
            return Ok((self.settings.initial_seed_for(kind), false, None));
        }

        let parent_id = previous_version_uuid
            .ok_or(AppError::RegenerationMissingParent)?
            .to_string();

        let parent = self
            .audit_store
            .get_by_id(&parent_id)
            .await?
            .ok_or_else(|| AppError::ParentNotFound(parent_id.clone()))?;

        if parent.document_kind != kind.as_str() || parent.user_id != user_id {
            return Err(AppError::ParentNotFound(parent_id));
        }

        Ok((parent.seed + 1, true, Some(parent_id)))
    }

    async fn record(
        &self,
        kind: DocumentKind,
        user_id: &str,
        input_data: Value,
        output_data: Option<Value>,
        model_used: &str,
        tokens_used: Option<i64>,
        generation_time_ms: Option<i64>,
        status: AuditStatus,
        error_message: Option<String>,
        seed: i64,
        is_regenerated: bool,
        previous_version_uuid: Option<String>,
    ) -> String {
        let result = self
            .audit_store
            .append(NewAuditRecord {
                user_id: user_id.to_string(),
                document_kind: kind.as_str(),
                document_version: schema_registry::version_for(kind).to_string(),
                input_data,
                output_data,
                model_used: model_used.to_string(),
                tokens_used,
                generation_time_ms,
                status,
                error_message,
                seed,
                is_regenerated,
                previous_version_uuid,
            })
            .await;

        match result {
            Ok(row) => row.id,
            Err(e) => {
                tracing::error!(error = %e, "audit write failed");
                String::new()
            }
        }
    }

    pub async fn generate_treatment_summary(
        &self,
        req: TreatmentRequest,
        user_id: String,
    ) -> AppResult<TreatmentResponse> {
        let kind = DocumentKind::TreatmentSummary;
        let input_value = serde_json::to_value(&req)?;
        let redacted_input = self.redacted_input(&input_value);

        let (seed, is_regenerated, previous_version_uuid) = match self
            .resolve_seed(kind, &user_id, req.is_regeneration, req.previous_version_uuid.as_deref())
            .await
        {
            Ok(v) => v,
            Err(e) => {
                self.record(
                    kind,
                    &user_id,
                    redacted_input,
                    None,
                    &self.settings.openai_model,
                    None,
                    None,
                    AuditStatus::Error,
                    Some(e.to_string()),
                    0,
                    req.is_regeneration,
                    req.previous_version_uuid.clone(),
                )
                .await;
                return Err(e);
            }
        };

        match self.run_treatment(&req, seed).await {
            Ok((selection, document, tokens_used, elapsed_ms, model_used)) => {
                let output_value = serde_json::to_value(&document)?;
                let generation_id = self
                    .record(
                        kind,
                        &user_id,
                        redacted_input,
                        Some(output_value),
                        &model_used,
                        tokens_used,
                        Some(elapsed_ms),
                        AuditStatus::Success,
                        None,
                        seed,
                        is_regenerated,
                        previous_version_uuid.clone(),
                    )
                    .await;

                Ok(TreatmentResponse {
                    success: true,
                    document,
                    cdt_codes: CdtSelection {
                        primary_code: selection.primary_code,
                        primary_description: selection.primary_description,
                        suggested_add_ons: selection.add_ons.into_iter().map(|a| a.code).collect(),
                        notes: selection.notes,
                    },
                    metadata: TreatmentMetadata {
                        tokens_used,
                        generation_time_ms: elapsed_ms,
                        audience: prompts::audience_str(req.audience),
                        tone: prompts::tone_str(req.tone),
                        seed,
                        document_version: schema_registry::version_for(kind),
                    },
                    uuid: generation_id,
                    is_regenerated,
                    previous_version_uuid,
                    seed,
                })
            }
            Err(e) => {
                self.record(
                    kind,
                    &user_id,
                    redacted_input,
                    None,
                    &self.settings.openai_model,
                    None,
                    None,
                    AuditStatus::Error,
                    Some(e.to_string()),
                    seed,
                    is_regenerated,
                    previous_version_uuid,
                )
                .await;
                Err(e)
            }
        }
    }

    async fn run_treatment(
        &self,
        req: &TreatmentRequest,
        seed: i64,
    ) -> AppResult<(SelectionResult, TreatmentDocument, Option<i64>, i64, String)> {
        let tier = req
            .tier
            .ok_or_else(|| AppError::InsufficientInput("tier is required".to_string()))?;
        let patient_age = req
            .patient_age
            .ok_or_else(|| AppError::InsufficientInput("patient_age is required".to_string()))?;
        let age_group = AgeGroup::from_age(patient_age);

        let selection = selector::select(&self.code_store, tier.as_str(), age_group.as_str(), None).await?;

        let prompt_fields = prompts::TreatmentPromptFields {
            patient_age: Some(patient_age),
            age_group: Some(age_group.as_str()),
            patient_name: req.patient_name.clone(),
            practice_name: req.practice_name.clone(),
            treatment_type: req.treatment_type.clone(),
            area_treated: req.area_treated,
            duration_range: req.duration_range.clone(),
            case_difficulty: req.case_difficulty.map(|d| d.as_str().to_string()),
            monitoring_approach: req.monitoring_approach.map(|m| m.as_str().to_string()),
            attachments: req.attachments.map(|a| a.as_str().to_string()),
            whitening_included: req.whitening_included,
            dentist_note: req.dentist_note.clone(),
            audience: req.audience,
            tone: req.tone,
        };
        let user_prompt = prompts::build_treatment_user_prompt(&prompt_fields);

        let completion = self
            .llm_client
            .generate(
                CompletionRequest {
                    system_prompt: prompts::TREATMENT_SUMMARY_SYSTEM_PROMPT.to_string(),
                    user_prompt,
                    temperature: TREATMENT_TEMPERATURE,
                    max_tokens: TREATMENT_MAX_TOKENS,
                    seed,
                },
                ExpectedSchema::TreatmentSummary,
            )
            .await?;

        let document: TreatmentDocument = serde_json::from_value(completion.parsed_output)
            .map_err(|e| AppError::LLMCallFailed(format!("malformed LLM output: {e}")))?;

        Ok((
            selection,
            document,
            completion.tokens_used,
            completion.elapsed_ms,
            completion.model_used,
        ))
    }

    pub async fn generate_insurance_summary(
        &self,
        req: InsuranceRequest,
        user_id: String,
    ) -> AppResult<InsuranceResponse> {
        let kind = DocumentKind::InsuranceSummary;
        let input_value = serde_json::to_value(&req)?;
        let redacted_input = self.redacted_input(&input_value);

        let (seed, is_regenerated, previous_version_uuid) = match self
            .resolve_seed(kind, &user_id, req.is_regeneration, req.previous_version_uuid.as_deref())
            .await
        {
            Ok(v) => v,
            Err(e) => {
                self.record(
                    kind,
                    &user_id,
                    redacted_input,
                    None,
                    &self.settings.openai_model,
                    None,
                    None,
                    AuditStatus::Error,
                    Some(e.to_string()),
                    0,
                    req.is_regeneration,
                    req.previous_version_uuid.clone(),
                )
                .await;
                return Err(e);
            }
        };

        match self.run_insurance(&req, seed).await {
            Ok((selection, document, tokens_used, elapsed_ms, model_used)) => {
                let output_value = serde_json::to_value(&document)?;
                let generation_id = self
                    .record(
                        kind,
                        &user_id,
                        redacted_input,
                        Some(output_value),
                        &model_used,
                        tokens_used,
                        Some(elapsed_ms),
                        AuditStatus::Success,
                        None,
                        seed,
                        is_regenerated,
                        previous_version_uuid.clone(),
                    )
                    .await;

                let mut cdt_codes = vec![InsuranceCdtCode {
                    code: selection.primary_code,
                    description: selection.primary_description,
                    category: selection.primary_category,
                }];
                cdt_codes.extend(selection.add_ons.into_iter().map(|a| InsuranceCdtCode {
                    code: a.code,
                    description: a.description,
                    category: a.category,
                }));

                Ok(InsuranceResponse {
                    success: true,
                    document,
                    cdt_codes,
                    metadata: InsuranceMetadata {
                        tokens_used,
                        generation_time_ms: elapsed_ms,
                        seed,
                        document_version: schema_registry::version_for(kind),
                    },
                    uuid: generation_id,
                    is_regenerated,
                    previous_version_uuid,
                    seed,
                })
            }
            Err(e) => {
                self.record(
                    kind,
                    &user_id,
                    redacted_input,
                    None,
                    &self.settings.openai_model,
                    None,
                    None,
                    AuditStatus::Error,
                    Some(e.to_string()),
                    seed,
                    is_regenerated,
                    previous_version_uuid,
                )
                .await;
                Err(e)
            }
        }
    }

    async fn run_insurance(
        &self,
        req: &InsuranceRequest,
        seed: i64,
    ) -> AppResult<(SelectionResult, InsuranceDocument, Option<i64>, i64, String)> {
        let tier = req
            .tier
            .ok_or_else(|| AppError::InsufficientInput("tier is required".to_string()))?;
        let age_group = req
            .age_group
            .ok_or_else(|| AppError::InsufficientInput("age_group is required".to_string()))?;

        let selection = selector::select(
            &self.code_store,
            tier.as_case_tier().as_str(),
            age_group.as_str(),
            Some(&req.diagnostic_assets),
        )
        .await?;

        let prompt_fields = prompts::InsurancePromptFields {
            tier: tier.as_case_tier().as_str().to_string(),
            age_group: age_group.as_str().to_string(),
            arches: req.arches,
            retainers_included: req.retainers_included,
            monitoring_approach: req.monitoring_approach.map(|m| m.as_str().to_string()),
            notes: req.notes.clone(),
        };
        let user_prompt = prompts::build_insurance_user_prompt(&prompt_fields);

        let completion = self
            .llm_client
            .generate(
                CompletionRequest {
                    system_prompt: prompts::INSURANCE_SUMMARY_SYSTEM_PROMPT.to_string(),
                    user_prompt,
                    temperature: INSURANCE_TEMPERATURE,
                    max_tokens: INSURANCE_MAX_TOKENS,
                    seed,
                },
                ExpectedSchema::InsuranceSummary,
            )
            .await?;

        let document: InsuranceDocument = serde_json::from_value(completion.parsed_output)
            .map_err(|e| AppError::LLMCallFailed(format!("malformed LLM output: {e}")))?;

        Ok((
            selection,
            document,
            completion.tokens_used,
            completion.elapsed_ms,
            completion.model_used,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::llm::{CompletionResponse, Provider};
    use async_trait::async_trait;

    struct StubProvider;

    #[async_trait]
    impl Provider for StubProvider {
        async fn complete(
            &self,
            req: &CompletionRequest,
        ) -> Result<CompletionResponse, String> {
            Ok(CompletionResponse {
                content: format!(
                    r#"{{"title": "Summary for seed {}", "summary": "Generated text"}}"#,
                    req.seed
                ),
                model: "stub-model".to_string(),
                tokens_used: Some(50),
            })
        }
        fn name(&self) -> &'static str {
            "stub"
        }
        fn is_configured(&self) -> bool {
            true
        }
    }

    fn settings() -> Arc<Settings> {
        Arc::new(Settings {
            openai_api_key: "test".to_string(),
            openai_model: "gpt-4o".to_string(),
            database_url: "sqlite::memory:".to_string(),
            secret_key: String::new(),
            jwt_issuer: None,
            jwt_audience: None,
            jwt_public_key: None,
            enable_auth_bypass: true,
            cors_origins: vec!["*".to_string()],
            store_full_audit_data: true,
            redact_phi_fields: true,
            phi_fields_to_redact: vec!["patient_name".to_string(), "practice_name".to_string()],
            treatment_summary_seed: 42,
            insurance_summary_seed: 42,
            progress_notes_seed: 42,
        })
    }

    async fn coordinator() -> Coordinator {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let code_store = CodeStore::new(db.pool().clone());
        let audit_store = AuditStore::new(db.pool().clone());
        let llm_client = LlmClient::with_provider(Arc::new(StubProvider));
        Coordinator::new(code_store, audit_store, llm_client, settings())
    }

    fn treatment_req(is_regeneration: bool, previous: Option<String>) -> TreatmentRequest {
        TreatmentRequest {
            tier: Some(CaseTier::Moderate),
            patient_age: Some(30),
            is_regeneration,
            previous_version_uuid: previous,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn s1_initial_generation_uses_configured_seed() {
        let coordinator = coordinator().await;
        let response = coordinator
            .generate_treatment_summary(treatment_req(false, None), "dev_user_001".to_string())
            .await
            .unwrap();
        assert_eq!(response.seed, 42);
        assert!(!response.is_regenerated);
        assert!(response.previous_version_uuid.is_none());
    }

    #[tokio::test]
    async fn s2_first_regeneration_increments_seed() {
        let coordinator = coordinator().await;
        let first = coordinator
            .generate_treatment_summary(treatment_req(false, None), "dev_user_001".to_string())
            .await
            .unwrap();

        let second = coordinator
            .generate_treatment_summary(
                treatment_req(true, Some(first.uuid.clone())),
                "dev_user_001".to_string(),
            )
            .await
            .unwrap();

        assert_eq!(second.seed, 43);
        assert!(second.is_regenerated);
        assert_eq!(second.previous_version_uuid, Some(first.uuid));
    }

    #[tokio::test]
    async fn s5_missing_parent_fails_with_parent_not_found() {
        let coordinator = coordinator().await;
        let err = coordinator
            .generate_treatment_summary(
                treatment_req(true, Some("nonexistent".to_string())),
                "dev_user_001".to_string(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ParentNotFound(_)));
    }

    #[tokio::test]
    async fn regeneration_without_parent_id_fails() {
        let coordinator = coordinator().await;
        let err = coordinator
            .generate_treatment_summary(treatment_req(true, None), "dev_user_001".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RegenerationMissingParent));
    }

    #[tokio::test]
    async fn missing_patient_age_fails_insufficient_input() {
        let coordinator = coordinator().await;
        let mut req = treatment_req(false, None);
        req.patient_age = None;
        let err = coordinator
            .generate_treatment_summary(req, "dev_user_001".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientInput(_)));
    }
}
