//! Append-only audit log of generation events (spec.md §4.5).
//!
//! No `UPDATE`/`DELETE` statement appears anywhere in this module's API
//! surface — that's what "append-only" means operationally.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::SqlitePool;

use crate::db::schema::{self, AuditRecordRow};
use crate::error::AppResult;

#[derive(Debug, Clone)]
pub struct AuditStore {
    pool: SqlitePool,
}

/// Fields required to append a generation event, success or failure.
#[derive(Debug, Clone)]
pub struct NewAuditRecord {
    pub user_id: String,
    pub document_kind: &'static str,
    pub document_version: String,
    pub input_data: Value,
    pub output_data: Option<Value>,
    pub model_used: String,
    pub tokens_used: Option<i64>,
    pub generation_time_ms: Option<i64>,
    pub status: AuditStatus,
    pub error_message: Option<String>,
    pub seed: i64,
    pub is_regenerated: bool,
    pub previous_version_uuid: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Success,
    Error,
}

impl AuditStatus {
    fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Success => "success",
            AuditStatus::Error => "error",
        }
    }
}

impl AuditStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Appends a single generation event and returns the persisted row
    /// with its assigned id. Writes MUST succeed whether or not the
    /// generation itself succeeded (spec.md §4.5).
    pub async fn append(&self, record: NewAuditRecord) -> AppResult<AuditRecordRow> {
        let id = schema::new_id();
        let input_json = serde_json::to_string(&record.input_data)?;
        let output_json = record
            .output_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            "INSERT INTO audit_records \
             (id, user_id, document_kind, document_version, input_data, output_data, \
              model_used, tokens_used, generation_time_ms, status, error_message, \
              seed, is_regenerated, previous_version_uuid) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        )
        .bind(&id)
        .bind(&record.user_id)
        .bind(record.document_kind)
        .bind(&record.document_version)
        .bind(&input_json)
        .bind(&output_json)
        .bind(&record.model_used)
        .bind(record.tokens_used)
        .bind(record.generation_time_ms)
        .bind(record.status.as_str())
        .bind(&record.error_message)
        .bind(record.seed)
        .bind(record.is_regenerated)
        .bind(&record.previous_version_uuid)
        .execute(&self.pool)
        .await?;

        self.get_by_id(&id)
            .await?
            .ok_or_else(|| crate::error::AppError::Internal("audit record vanished after insert".into()))
    }

    pub async fn get_by_id(&self, id: &str) -> AppResult<Option<AuditRecordRow>> {
        let row = sqlx::query_as::<_, AuditRecordRow>("SELECT * FROM audit_records WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<AuditRecordRow>> {
        let rows = sqlx::query_as::<_, AuditRecordRow>(
            "SELECT * FROM audit_records WHERE user_id = ?1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_by_kind(&self, document_kind: &str) -> AppResult<Vec<AuditRecordRow>> {
        let rows = sqlx::query_as::<_, AuditRecordRow>(
            "SELECT * FROM audit_records WHERE document_kind = ?1 ORDER BY created_at DESC",
        )
        .bind(document_kind)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<AuditRecordRow>> {
        let rows = sqlx::query_as::<_, AuditRecordRow>(
            "SELECT * FROM audit_records WHERE created_at BETWEEN ?1 AND ?2 ORDER BY created_at DESC",
        )
        .bind(from.format("%Y-%m-%d %H:%M:%S").to_string())
        .bind(to.format("%Y-%m-%d %H:%M:%S").to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use serde_json::json;

    async fn store() -> AuditStore {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        AuditStore::new(db.pool().clone())
    }

    fn base_record() -> NewAuditRecord {
        NewAuditRecord {
            user_id: "dev_user_001".to_string(),
            document_kind: "treatment_summary",
            document_version: "v1".to_string(),
            input_data: json!({ "tier": "moderate" }),
            output_data: Some(json!({ "title": "t", "summary": "s" })),
            model_used: "gpt-4o".to_string(),
            tokens_used: Some(150),
            generation_time_ms: Some(900),
            status: AuditStatus::Success,
            error_message: None,
            seed: 42,
            is_regenerated: false,
            previous_version_uuid: None,
        }
    }

    #[tokio::test]
    async fn append_assigns_id_and_round_trips() {
        let store = store().await;
        let row = store.append(base_record()).await.unwrap();
        assert!(!row.id.is_empty());
        assert_eq!(row.seed, 42);

        let fetched = store.get_by_id(&row.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, row.id);
    }

    #[tokio::test]
    async fn error_path_records_audit_too() {
        let store = store().await;
        let mut record = base_record();
        record.status = AuditStatus::Error;
        record.error_message = Some("llm call failed: timeout".to_string());
        record.output_data = None;
        let row = store.append(record).await.unwrap();
        assert_eq!(row.status, "error");
        assert!(row.error_message.is_some());
    }

    #[tokio::test]
    async fn list_by_user_orders_most_recent_first() {
        let store = store().await;
        store.append(base_record()).await.unwrap();
        store.append(base_record()).await.unwrap();
        let rows = store.list_by_user("dev_user_001").await.unwrap();
        assert_eq!(rows.len(), 2);
    }
}
