//! Persistence for `ProcedureCode` and `SelectionRule` (spec.md §3).
//!
//! The admin CRUD surface is out of scope; what's in scope is the data
//! model and the write-time invariant checks (I1–I3).

use sqlx::SqlitePool;

use crate::db::schema::{ProcedureCodeRow, SelectionRuleRow};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct CodeStore {
    pool: SqlitePool,
}

impl CodeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_code(&self, code: &str) -> AppResult<Option<ProcedureCodeRow>> {
        let row = sqlx::query_as::<_, ProcedureCodeRow>(
            "SELECT * FROM procedure_codes WHERE code = ?1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Active rules for `(tier, age_group)`, ordered `priority DESC,
    /// updated_at DESC` per spec.md §4.1 step 2.
    pub async fn active_rules_for(
        &self,
        tier: &str,
        age_group: &str,
    ) -> AppResult<Vec<SelectionRuleRow>> {
        let rows = sqlx::query_as::<_, SelectionRuleRow>(
            "SELECT * FROM selection_rules \
             WHERE tier = ?1 AND age_group = ?2 AND is_active = 1 \
             ORDER BY priority DESC, updated_at DESC",
        )
        .bind(tier)
        .bind(age_group)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Inserts or updates a selection rule, enforcing I1–I3. Not on the
    /// generation critical path; exercised by tests and the (out-of-scope)
    /// admin surface's invariant layer.
    pub async fn upsert_rule(
        &self,
        id: &str,
        tier: &str,
        age_group: &str,
        code: &str,
        priority: i64,
        is_active: bool,
    ) -> AppResult<()> {
        const VALID_TIERS: &[&str] = &["express", "mild", "moderate", "complex"];
        const VALID_AGE_GROUPS: &[&str] = &["adolescent", "adult"];

        if !VALID_TIERS.contains(&tier) || !VALID_AGE_GROUPS.contains(&age_group) {
            return Err(AppError::SchemaViolation(format!(
                "invalid tier/age_group: {tier}/{age_group}"
            )));
        }

        let code_row = self.get_code(code).await?;
        match code_row {
            Some(row) if row.is_active => {}
            _ => {
                return Err(AppError::CodeInactive(code.to_string()));
            }
        }

        if is_active {
            let existing = self.active_rules_for(tier, age_group).await?;
            if existing.iter().any(|r| r.id != id) {
                return Err(AppError::SchemaViolation(format!(
                    "an active rule already exists for tier={tier}, age_group={age_group}"
                )));
            }
        }

        sqlx::query(
            "INSERT INTO selection_rules (id, tier, age_group, code, priority, is_active, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now')) \
             ON CONFLICT(id) DO UPDATE SET \
                tier = excluded.tier, age_group = excluded.age_group, code = excluded.code, \
                priority = excluded.priority, is_active = excluded.is_active, \
                updated_at = datetime('now')",
        )
        .bind(id)
        .bind(tier)
        .bind(age_group)
        .bind(code)
        .bind(priority)
        .bind(is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn store() -> CodeStore {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        CodeStore::new(db.pool().clone())
    }

    #[tokio::test]
    async fn seeded_rules_resolve_in_priority_order() {
        let store = store().await;
        let rules = store.active_rules_for("moderate", "adult").await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].code, "D8090");
    }

    #[tokio::test]
    async fn upsert_rejects_inactive_code() {
        let store = store().await;
        let err = store
            .upsert_rule("rule-x", "express", "adult", "D9999", 5, true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CodeInactive(_)));
    }

    #[tokio::test]
    async fn upsert_rejects_second_active_rule_for_same_pair() {
        let store = store().await;
        let err = store
            .upsert_rule("rule-y", "moderate", "adult", "D8010", 5, true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SchemaViolation(_)));
    }
}
