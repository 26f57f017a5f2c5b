use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::HeaderMap,
};
use kindling_db::StoreError;
use kindling_db::models::{BreedingRecord, LitterUpdate, NewRecord};
use serde::Serialize;
use serde_json::{Value, json};

use crate::AppState;
use crate::auth::resolve_claims;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct RecordList {
    pub records: Vec<BreedingRecord>,
}

/// Body rejections are reported only after the caller is authenticated.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

fn record_error(err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound => ApiError::NotFound("Record"),
        other => other.into(),
    }
}

/// GET /api/records
pub async fn list_records(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RecordList>, ApiError> {
    let claims = resolve_claims(&state, &headers)?;
    let records = state.records.list_for_user(claims.sub).await?;
    Ok(Json(RecordList { records }))
}

/// POST /api/records
pub async fn add_record(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<NewRecord>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let claims = resolve_claims(&state, &headers)?;
    let payload = body(payload)?;
    if payload.doe_name.trim().is_empty() {
        return Err(ApiError::BadRequest("doe_name is required".to_string()));
    }

    let record = state.records.create(claims.sub, payload).await?;
    tracing::debug!(user_id = claims.sub, record_id = record.id, "Record added");
    Ok(Json(json!({ "id": record.id, "message": "Record added successfully" })))
}

/// PUT /api/records/{id}
pub async fn update_record(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    payload: Result<Json<LitterUpdate>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let claims = resolve_claims(&state, &headers)?;
    let payload = body(payload)?;
    state
        .records
        .update_litter(claims.sub, id, payload)
        .await
        .map_err(record_error)?;
    Ok(Json(json!({ "message": "Record updated successfully" })))
}

/// DELETE /api/records/{id}
pub async fn delete_record(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let claims = resolve_claims(&state, &headers)?;
    state.records.delete(claims.sub, id).await.map_err(record_error)?;
    Ok(Json(json!({ "message": "Record deleted successfully" })))
}
