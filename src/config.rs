//! Process-wide settings resolved once at startup from the environment.
//!
//! Mirrors spec.md §6's environment variable table. `Settings` is built by
//! `Settings::from_env()` in `main` and handed down through `AppState`; it
//! is never reloaded.

use std::env;

#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: String,
    pub openai_model: String,
    pub database_url: String,
    pub secret_key: String,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: Option<String>,
    pub jwt_public_key: Option<String>,
    pub enable_auth_bypass: bool,
    pub cors_origins: Vec<String>,
    pub store_full_audit_data: bool,
    pub redact_phi_fields: bool,
    pub phi_fields_to_redact: Vec<String>,
    pub treatment_summary_seed: i64,
    pub insurance_summary_seed: i64,
    pub progress_notes_seed: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid boolean value for {name}: {value:?}")]
    InvalidBool { name: &'static str, value: String },
    #[error("invalid integer value for {name}: {value:?}")]
    InvalidInt { name: &'static str, value: String },
}

fn bool_var(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidBool { name, value: v }),
        },
    }
}

fn int_var(name: &'static str, default: i64) -> Result<i64, ConfigError> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(v) => v
            .trim()
            .parse::<i64>()
            .map_err(|_| ConfigError::InvalidInt { name, value: v }),
    }
}

fn csv_var(name: &str, default: &[&str]) -> Vec<String> {
    match env::var(name) {
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
        Ok(v) => v
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    }
}

impl Settings {
    /// Resolves settings from the process environment, loading a local
    /// `.env` first (ignored if absent — this is a convenience for local
    /// development, not a deployment mechanism). Fails fast on malformed
    /// enum-shaped variables rather than silently defaulting.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        Ok(Settings {
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string()),
            secret_key: env::var("SECRET_KEY").unwrap_or_default(),
            jwt_issuer: env::var("JWT_ISSUER").ok(),
            jwt_audience: env::var("JWT_AUDIENCE").ok(),
            jwt_public_key: env::var("JWT_PUBLIC_KEY").ok(),
            enable_auth_bypass: bool_var("ENABLE_AUTH_BYPASS", true)?,
            cors_origins: csv_var("CORS_ORIGINS", &["*"]),
            store_full_audit_data: bool_var("STORE_FULL_AUDIT_DATA", true)?,
            redact_phi_fields: bool_var("REDACT_PHI_FIELDS", true)?,
            phi_fields_to_redact: csv_var(
                "PHI_FIELDS_TO_REDACT",
                &["patient_name", "practice_name"],
            ),
            treatment_summary_seed: int_var("TREATMENT_SUMMARY_SEED", 42)?,
            insurance_summary_seed: int_var("INSURANCE_SUMMARY_SEED", 42)?,
            progress_notes_seed: int_var("PROGRESS_NOTES_SEED", 42)?,
        })
    }

    /// The configured initial seed for a document kind (spec.md §4.4).
    pub fn initial_seed_for(&self, kind: crate::domain::DocumentKind) -> i64 {
        use crate::domain::DocumentKind::*;
        match kind {
            TreatmentSummary => self.treatment_summary_seed,
            InsuranceSummary => self.insurance_summary_seed,
            ProgressNotes => self.progress_notes_seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_var_accepts_common_spellings() {
        assert!(bool_var("ORTHO_TEST_BOOL_UNSET", true).unwrap());
    }

    #[test]
    fn csv_var_splits_and_trims() {
        std::env::set_var("ORTHO_TEST_CSV", "a, b ,c");
        assert_eq!(
            csv_var("ORTHO_TEST_CSV", &[]),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        std::env::remove_var("ORTHO_TEST_CSV");
    }
}
