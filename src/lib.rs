//! Orthodontic case document generation gateway.
//!
//! A stateless HTTP service: every request carries everything needed to
//! produce a document, and the only state that survives a request is what
//! lands in the audit log and confirmation table.

pub mod audit_store;
pub mod auth;
pub mod code_store;
pub mod config;
pub mod confirmation_store;
pub mod coordinator;
pub mod db;
pub mod domain;
pub mod error;
pub mod http;
pub mod llm;
pub mod prompts;
pub mod redaction;
pub mod schema_registry;
pub mod selector;

use std::sync::Arc;

use audit_store::AuditStore;
use code_store::CodeStore;
use config::Settings;
use confirmation_store::ConfirmationStore;
use coordinator::Coordinator;
use db::Database;
use llm::LlmClient;

/// Shared application state handed to every axum handler via `State`.
///
/// Construction order mirrors `Settings::from_env` -> `Database::connect`
/// -> the stores and coordinator built on top of the pool.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub coordinator: Arc<Coordinator>,
    pub audit_store: AuditStore,
    pub confirmation_store: ConfirmationStore,
}

impl AppState {
    pub async fn new(settings: Settings) -> Result<Self, error::AppError> {
        let settings = Arc::new(settings);
        let db = Database::connect(&settings.database_url).await?;

        let code_store = CodeStore::new(db.pool().clone());
        let audit_store = AuditStore::new(db.pool().clone());
        let confirmation_store = ConfirmationStore::new(db.pool().clone());
        let llm_client = LlmClient::new(settings.openai_api_key.clone(), settings.openai_model.clone());

        let coordinator = Coordinator::new(
            code_store,
            audit_store.clone(),
            llm_client,
            settings.clone(),
        );

        Ok(Self {
            settings,
            coordinator: Arc::new(coordinator),
            audit_store,
            confirmation_store,
        })
    }
}
