use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use kindling_db::StoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid or already used license key")]
    InvalidOrUsedKey,

    #[error("Email already exists")]
    EmailExists,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Admin key required")]
    AdminUnauthorized,

    #[error("Admin API is disabled")]
    AdminDisabled,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidOrUsedKey | ApiError::EmailExists | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::InvalidCredentials | ApiError::MissingToken | ApiError::AdminUnauthorized => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::InvalidToken | ApiError::AdminDisabled => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Every license key problem surfaces as `InvalidOrUsedKey` during registration.
    pub fn from_registration(err: StoreError) -> Self {
        match err {
            StoreError::NotFound
            | StoreError::AlreadyUsed
            | StoreError::AlreadyRevoked
            | StoreError::InvalidInput(_) => ApiError::InvalidOrUsedKey,
            StoreError::Conflict(_) => ApiError::EmailExists,
            other => other.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound("resource"),
            StoreError::AlreadyUsed | StoreError::AlreadyRevoked => {
                ApiError::Conflict(err.to_string())
            }
            StoreError::InvalidInput(msg) => ApiError::BadRequest(msg),
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::StorageUnavailable(_) => ApiError::Internal(err.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ApiError::Internal(source) = &self {
            tracing::error!(error = ?source, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
