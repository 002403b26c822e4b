//! axum HTTP surface: routing, request extraction, and the confirmation
//! endpoint (spec.md §6). Generation endpoints delegate straight to
//! `Coordinator`; this module's own job is authentication, path/body
//! extraction, and CORS.

use axum::{
    async_trait,
    extract::{FromRequest, Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::Authenticator;
use crate::coordinator::{InsuranceRequest, InsuranceResponse, TreatmentRequest, TreatmentResponse};
use crate::error::{AppError, AppResult};
use crate::AppState;

/// `Json<T>` that maps deserialization failures to `AppError::SchemaViolation`
/// (422) instead of axum's default 400 rejection (spec.md §4.9).
struct ValidatedJson<T>(T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::SchemaViolation(e.to_string()))?;
        Ok(ValidatedJson(value))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/generate-treatment-summary", post(generate_treatment_summary))
        .route("/api/v1/generate-insurance-summary", post(generate_insurance_summary))
        .route("/api/v1/documents/:generation_id/confirm", post(confirm_document))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.settings.cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let parsed: Vec<axum::http::HeaderValue> = origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

/// Pulls `Bearer <token>` out of the `Authorization` header, if present.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

async fn generate_treatment_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(payload): ValidatedJson<TreatmentRequest>,
) -> AppResult<Json<TreatmentResponse>> {
    let user_id = Authenticator::new(&state.settings).authenticate(bearer_token(&headers))?;
    let response = state
        .coordinator
        .generate_treatment_summary(payload, user_id)
        .await?;
    Ok(Json(response))
}

async fn generate_insurance_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(payload): ValidatedJson<InsuranceRequest>,
) -> AppResult<Json<InsuranceResponse>> {
    let user_id = Authenticator::new(&state.settings).authenticate(bearer_token(&headers))?;
    let response = state
        .coordinator
        .generate_insurance_summary(payload, user_id)
        .await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct ConfirmRequest {
    #[serde(default = "default_confirmed_payload")]
    confirmed_payload: Value,
    notes: Option<String>,
}

fn default_confirmed_payload() -> Value {
    serde_json::json!({})
}

#[derive(Debug, Serialize)]
struct ConfirmResponse {
    success: bool,
    confirmation_id: String,
    generation_id: String,
    user_id: String,
    document_type: String,
    document_version: String,
    confirmed_at: String,
    message: String,
}

async fn confirm_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(generation_id): Path<String>,
    ValidatedJson(payload): ValidatedJson<ConfirmRequest>,
) -> AppResult<Json<ConfirmResponse>> {
    let user_id = Authenticator::new(&state.settings).authenticate(bearer_token(&headers))?;
    let row = state
        .confirmation_store
        .confirm(
            &state.audit_store,
            &generation_id,
            &user_id,
            payload.confirmed_payload,
            payload.notes,
        )
        .await?;

    Ok(Json(ConfirmResponse {
        success: true,
        confirmation_id: row.id,
        generation_id: row.generation_id,
        user_id: row.user_id,
        document_type: row.document_kind,
        document_version: row.document_version,
        confirmed_at: row.confirmed_at,
        message: "document confirmed".to_string(),
    }))
}
