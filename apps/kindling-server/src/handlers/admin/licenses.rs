use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use kindling_db::StoreError;
use kindling_db::models::{GenerateReport, LedgerStats, LicenseKey};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct GenerateKeysRequest {
    pub count: usize,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct RevokeKeyRequest {
    pub reason: String,
}

fn key_error(err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound => ApiError::NotFound("License key"),
        other => other.into(),
    }
}

/// POST /api/admin/licenses
pub async fn generate_keys(
    State(state): State<AppState>,
    Json(payload): Json<GenerateKeysRequest>,
) -> Result<(StatusCode, Json<GenerateReport>), ApiError> {
    let report = state
        .license_service
        .generate(payload.count, payload.notes.as_deref())
        .await?;
    info!(created = report.created.len(), failed = report.failed(), "Admin generated license keys");

    let status = if report.created.is_empty() { StatusCode::OK } else { StatusCode::CREATED };
    Ok((status, Json(report)))
}

/// GET /api/admin/licenses
pub async fn list_keys(State(state): State<AppState>) -> Result<Json<Vec<LicenseKey>>, ApiError> {
    Ok(Json(state.license_service.list_all().await?))
}

/// GET /api/admin/licenses/{key}
pub async fn get_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<LicenseKey>, ApiError> {
    state
        .license_service
        .find(&key)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("License key"))
}

/// POST /api/admin/licenses/{key}/revoke
pub async fn revoke_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(payload): Json<RevokeKeyRequest>,
) -> Result<Json<Value>, ApiError> {
    state
        .license_service
        .revoke(&key, payload.reason.trim())
        .await
        .map_err(key_error)?;
    Ok(Json(json!({ "message": "License key revoked" })))
}

/// GET /api/admin/licenses/stats
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<LedgerStats>, ApiError> {
    Ok(Json(state.license_service.stats().await?))
}
