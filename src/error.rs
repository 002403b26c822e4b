//! Centralized error handling for the document generation gateway.
//!
//! Provides `AppError` with one variant per error kind in the external
//! contract, a JSON body via axum's `IntoResponse`, and `From` impls so
//! every module can propagate with `?`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Request body failed schema/enum validation at the HTTP boundary.
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// No valid principal could be established.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// No active selection rule matched `(tier, age_group)`.
    #[error("no selection rule for tier={tier}, age_group={age_group}")]
    RuleNotFound { tier: String, age_group: String },

    /// Neither `age_group` nor a derivable `patient_age` was supplied.
    #[error("insufficient input: {0}")]
    InsufficientInput(String),

    /// The rule's referenced procedure code is missing or inactive.
    #[error("procedure code inactive or missing: {0}")]
    CodeInactive(String),

    /// Regeneration referenced a `previous_version_uuid` that doesn't exist.
    #[error("parent generation not found: {0}")]
    ParentNotFound(String),

    /// `is_regeneration=true` without a `previous_version_uuid`.
    #[error("regeneration requires previous_version_uuid")]
    RegenerationMissingParent,

    /// The LLM call failed (network, auth, rate limit, or schema-parse failure).
    #[error("llm call failed: {0}")]
    LLMCallFailed(String),

    /// The LLM call exceeded its deadline.
    #[error("llm call timed out")]
    LLMTimeout,

    /// A confirmation already exists for this generation id.
    #[error("generation already confirmed: {0}")]
    AlreadyConfirmed(String),

    /// Referenced generation id has no audit record.
    #[error("generation not found: {0}")]
    GenerationNotFound(String),

    /// Referenced generation exists but did not succeed.
    #[error("generation was not successful: {0}")]
    GenerationNotSuccessful(String),

    /// Anything else: database errors, serialization failures, bugs.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::SchemaViolation(_) => "SchemaViolation",
            AppError::Unauthenticated(_) => "Unauthenticated",
            AppError::RuleNotFound { .. } => "RuleNotFound",
            AppError::InsufficientInput(_) => "InsufficientInput",
            AppError::CodeInactive(_) => "CodeInactive",
            AppError::ParentNotFound(_) => "ParentNotFound",
            AppError::RegenerationMissingParent => "RegenerationMissingParent",
            AppError::LLMCallFailed(_) => "LLMCallFailed",
            AppError::LLMTimeout => "LLMTimeout",
            AppError::AlreadyConfirmed(_) => "AlreadyConfirmed",
            AppError::GenerationNotFound(_) => "GenerationNotFound",
            AppError::GenerationNotSuccessful(_) => "GenerationNotSuccessful",
            AppError::Internal(_) => "Internal",
        }
    }

    /// HTTP status mapping from spec.md §6/§7.
    fn status(&self) -> StatusCode {
        match self {
            AppError::SchemaViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::RuleNotFound { .. }
            | AppError::InsufficientInput(_)
            | AppError::CodeInactive(_)
            | AppError::RegenerationMissingParent => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ParentNotFound(_) => StatusCode::NOT_FOUND,
            AppError::LLMCallFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::LLMTimeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::AlreadyConfirmed(_) => StatusCode::CONFLICT,
            AppError::GenerationNotFound(_) => StatusCode::NOT_FOUND,
            AppError::GenerationNotSuccessful(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), %self, "request failed");
        } else {
            tracing::warn!(kind = self.kind(), %self, "request rejected");
        }
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// From implementations for automatic error conversion
// ============================================================================

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::Internal("record not found".to_string()),
            _ => AppError::Internal(format!("database error: {err}")),
        }
    }
}

impl From<crate::db::DbError> for AppError {
    fn from(err: crate::db::DbError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::LLMTimeout
        } else {
            AppError::LLMCallFailed(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SchemaViolation(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::Unauthenticated(err.to_string())
    }
}

// ============================================================================
// Convenience type alias
// ============================================================================

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_spec_table() {
        assert_eq!(
            AppError::SchemaViolation("x".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::Unauthenticated("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::RuleNotFound {
                tier: "complex".into(),
                age_group: "adult".into()
            }
            .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::ParentNotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::RegenerationMissingParent.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::LLMCallFailed("x".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(AppError::LLMTimeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            AppError::AlreadyConfirmed("x".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::GenerationNotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::GenerationNotSuccessful("x".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_body_carries_kind_and_message() {
        let resp = AppError::AlreadyConfirmed("gen-1".into()).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }
}
