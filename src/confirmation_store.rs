//! At-most-one confirmation per generation (spec.md §4.6, invariant I7).

use serde_json::Value;
use sqlx::SqlitePool;

use crate::audit_store::AuditStore;
use crate::db::schema::{self, ConfirmationRow};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct ConfirmationStore {
    pool: SqlitePool,
}

impl ConfirmationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates a confirmation for `generation_id`, enforcing I7. The
    /// referenced audit record must exist and have `status=success`.
    pub async fn confirm(
        &self,
        audit_store: &AuditStore,
        generation_id: &str,
        user_id: &str,
        confirmed_payload: Value,
        notes: Option<String>,
    ) -> AppResult<ConfirmationRow> {
        let audit = audit_store
            .get_by_id(generation_id)
            .await?
            .ok_or_else(|| AppError::GenerationNotFound(generation_id.to_string()))?;

        if audit.status != "success" {
            return Err(AppError::GenerationNotSuccessful(generation_id.to_string()));
        }

        if self.is_confirmed(generation_id).await? {
            return Err(AppError::AlreadyConfirmed(generation_id.to_string()));
        }

        let id = schema::new_id();
        let payload_json = serde_json::to_string(&confirmed_payload)?;

        let insert = sqlx::query(
            "INSERT INTO confirmations \
             (id, generation_id, user_id, document_kind, document_version, confirmed_payload, notes) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&id)
        .bind(generation_id)
        .bind(user_id)
        .bind(&audit.document_kind)
        .bind(&audit.document_version)
        .bind(&payload_json)
        .bind(&notes)
        .execute(&self.pool)
        .await;

        if let Err(sqlx::Error::Database(db_err)) = &insert {
            if db_err.is_unique_violation() {
                return Err(AppError::AlreadyConfirmed(generation_id.to_string()));
            }
        }
        insert?;

        self.get(generation_id)
            .await?
            .ok_or_else(|| AppError::Internal("confirmation vanished after insert".into()))
    }

    pub async fn is_confirmed(&self, generation_id: &str) -> AppResult<bool> {
        let row = sqlx::query_as::<_, ConfirmationRow>(
            "SELECT * FROM confirmations WHERE generation_id = ?1",
        )
        .bind(generation_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    pub async fn get(&self, generation_id: &str) -> AppResult<Option<ConfirmationRow>> {
        let row = sqlx::query_as::<_, ConfirmationRow>(
            "SELECT * FROM confirmations WHERE generation_id = ?1",
        )
        .bind(generation_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit_store::{AuditStatus, NewAuditRecord};
    use crate::db::Database;
    use serde_json::json;

    async fn stores() -> (AuditStore, ConfirmationStore) {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        (
            AuditStore::new(db.pool().clone()),
            ConfirmationStore::new(db.pool().clone()),
        )
    }

    async fn successful_generation(audit: &AuditStore) -> String {
        let row = audit
            .append(NewAuditRecord {
                user_id: "dev_user_001".to_string(),
                document_kind: "treatment_summary",
                document_version: "v1".to_string(),
                input_data: json!({}),
                output_data: Some(json!({ "title": "t", "summary": "s" })),
                model_used: "gpt-4o".to_string(),
                tokens_used: Some(10),
                generation_time_ms: Some(10),
                status: AuditStatus::Success,
                error_message: None,
                seed: 42,
                is_regenerated: false,
                previous_version_uuid: None,
            })
            .await
            .unwrap();
        row.id
    }

    #[tokio::test]
    async fn confirms_successfully_once() {
        let (audit, confirmations) = stores().await;
        let gen_id = successful_generation(&audit).await;

        let confirmation = confirmations
            .confirm(&audit, &gen_id, "dev_user_001", json!({"ok": true}), None)
            .await
            .unwrap();
        assert_eq!(confirmation.generation_id, gen_id);
        assert!(confirmations.is_confirmed(&gen_id).await.unwrap());
    }

    #[tokio::test]
    async fn second_confirmation_fails_with_already_confirmed() {
        let (audit, confirmations) = stores().await;
        let gen_id = successful_generation(&audit).await;

        confirmations
            .confirm(&audit, &gen_id, "dev_user_001", json!({}), None)
            .await
            .unwrap();
        let err = confirmations
            .confirm(&audit, &gen_id, "dev_user_001", json!({}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyConfirmed(_)));
    }

    #[tokio::test]
    async fn unknown_generation_fails_with_generation_not_found() {
        let (audit, confirmations) = stores().await;
        let err = confirmations
            .confirm(&audit, "nonexistent", "dev_user_001", json!({}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::GenerationNotFound(_)));
    }

    #[tokio::test]
    async fn failed_generation_cannot_be_confirmed() {
        let (audit, confirmations) = stores().await;
        let row = audit
            .append(NewAuditRecord {
                user_id: "dev_user_001".to_string(),
                document_kind: "treatment_summary",
                document_version: "v1".to_string(),
                input_data: json!({}),
                output_data: None,
                model_used: "gpt-4o".to_string(),
                tokens_used: None,
                generation_time_ms: None,
                status: AuditStatus::Error,
                error_message: Some("llm call failed".to_string()),
                seed: 42,
                is_regenerated: false,
                previous_version_uuid: None,
            })
            .await
            .unwrap();

        let err = confirmations
            .confirm(&audit, &row.id, "dev_user_001", json!({}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::GenerationNotSuccessful(_)));
    }
}
