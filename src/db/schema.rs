//! SQLite schema for the document generation gateway.
//!
//! Tables mirror the persisted entities: procedure codes, selection
//! rules, the append-only audit log, and confirmations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS procedure_codes (
    code TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    category TEXT NOT NULL CHECK(category IN ('orthodontic', 'diagnostic', 'retention')),
    is_primary INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS selection_rules (
    id TEXT PRIMARY KEY,
    tier TEXT NOT NULL CHECK(tier IN ('express', 'mild', 'moderate', 'complex')),
    age_group TEXT NOT NULL CHECK(age_group IN ('adolescent', 'adult')),
    code TEXT NOT NULL,
    priority INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (code) REFERENCES procedure_codes(code)
);

CREATE INDEX IF NOT EXISTS idx_selection_rules_lookup
    ON selection_rules(tier, age_group, is_active);

CREATE TABLE IF NOT EXISTS audit_records (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    document_kind TEXT NOT NULL CHECK(document_kind IN ('treatment_summary', 'insurance_summary', 'progress_notes')),
    document_version TEXT NOT NULL,
    input_data TEXT NOT NULL,
    output_data TEXT,
    model_used TEXT NOT NULL,
    tokens_used INTEGER,
    generation_time_ms INTEGER,
    status TEXT NOT NULL CHECK(status IN ('success', 'error')),
    error_message TEXT,
    seed INTEGER NOT NULL,
    is_regenerated INTEGER NOT NULL DEFAULT 0,
    previous_version_uuid TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (previous_version_uuid) REFERENCES audit_records(id)
);

CREATE INDEX IF NOT EXISTS idx_audit_records_user ON audit_records(user_id);
CREATE INDEX IF NOT EXISTS idx_audit_records_kind ON audit_records(document_kind);
CREATE INDEX IF NOT EXISTS idx_audit_records_created ON audit_records(created_at);

CREATE TABLE IF NOT EXISTS confirmations (
    id TEXT PRIMARY KEY,
    generation_id TEXT NOT NULL UNIQUE,
    user_id TEXT NOT NULL,
    document_kind TEXT NOT NULL,
    document_version TEXT NOT NULL,
    confirmed_at TEXT NOT NULL DEFAULT (datetime('now')),
    confirmed_payload TEXT NOT NULL,
    notes TEXT,
    pdf_generated_at TEXT,
    FOREIGN KEY (generation_id) REFERENCES audit_records(id)
);
"#;

/// Seed data matching the canonical selector scenarios.
pub const SEED_DATA: &str = r#"
INSERT OR IGNORE INTO procedure_codes (code, description, category, is_primary, is_active) VALUES
    ('D8010', 'Limited orthodontic treatment of the primary dentition', 'orthodontic', 1, 1),
    ('D8080', 'Comprehensive orthodontic treatment of the adolescent dentition', 'orthodontic', 1, 1),
    ('D8090', 'Comprehensive orthodontic treatment of the adult dentition', 'orthodontic', 1, 1),
    ('D0350', '2D oral/facial photographic images', 'diagnostic', 0, 1),
    ('D0330', 'Panoramic radiographic image', 'diagnostic', 0, 1),
    ('D0210', 'Intraoral - complete series of radiographic images', 'diagnostic', 0, 1),
    ('D8680', 'Orthodontic retention', 'retention', 0, 1);

INSERT OR IGNORE INTO selection_rules (id, tier, age_group, code, priority, is_active) VALUES
    ('00000000-0000-0000-0000-000000000001', 'express', 'adolescent', 'D8010', 10, 1),
    ('00000000-0000-0000-0000-000000000002', 'express', 'adult', 'D8010', 10, 1),
    ('00000000-0000-0000-0000-000000000003', 'mild', 'adolescent', 'D8010', 10, 1),
    ('00000000-0000-0000-0000-000000000004', 'mild', 'adult', 'D8010', 10, 1),
    ('00000000-0000-0000-0000-000000000005', 'moderate', 'adolescent', 'D8080', 10, 1),
    ('00000000-0000-0000-0000-000000000006', 'moderate', 'adult', 'D8090', 10, 1),
    ('00000000-0000-0000-0000-000000000007', 'complex', 'adolescent', 'D8080', 10, 1),
    ('00000000-0000-0000-0000-000000000008', 'complex', 'adult', 'D8090', 10, 1);
"#;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProcedureCodeRow {
    pub code: String,
    pub description: String,
    pub category: String,
    pub is_primary: bool,
    pub is_active: bool,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SelectionRuleRow {
    pub id: String,
    pub tier: String,
    pub age_group: String,
    pub code: String,
    pub priority: i64,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditRecordRow {
    pub id: String,
    pub user_id: String,
    pub document_kind: String,
    pub document_version: String,
    pub input_data: String,
    pub output_data: Option<String>,
    pub model_used: String,
    pub tokens_used: Option<i64>,
    pub generation_time_ms: Option<i64>,
    pub status: String,
    pub error_message: Option<String>,
    pub seed: i64,
    pub is_regenerated: bool,
    pub previous_version_uuid: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConfirmationRow {
    pub id: String,
    pub generation_id: String,
    pub user_id: String,
    pub document_kind: String,
    pub document_version: String,
    pub confirmed_at: String,
    pub confirmed_payload: String,
    pub notes: Option<String>,
    pub pdf_generated_at: Option<String>,
}

/// Parses a `sqlite` `TEXT` timestamp (`datetime('now')` format) into UTC.
pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
