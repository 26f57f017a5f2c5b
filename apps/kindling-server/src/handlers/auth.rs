use axum::{Json, extract::State};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;
use crate::services::registration_service::AuthSession;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default, alias = "licenseKey")]
    pub license_key: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/register
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<AuthSession>, ApiError> {
    let session = state
        .registration_service
        .register(&payload.email, &payload.password, payload.license_key.as_deref())
        .await?;
    Ok(Json(session))
}

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthSession>, ApiError> {
    let session = state
        .registration_service
        .login(&payload.email, &payload.password)
        .await?;
    Ok(Json(session))
}
