//! API key management for the signed-in owner.
//!
//! - POST /api-keys
//! - GET /api-keys
//! - POST /api-keys/{id}/revoke

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::{auth::AuthContext, request_meta::RequestMeta},
    models::{
        activity_log::{ActivityCategory, NewActivityLog},
        api_key::{ApiKeyResponse, CreateApiKeyRequest},
    },
    services::api_key_service,
    state::AppState,
};

/// Create a key.
///
/// # Response
///
/// Returns 201 Created. The raw `key` is only returned here.
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "name": "Reporting",
///   "key_prefix": "lk_1a2b3c4d",
///   "key": "lk_1a2b3c4d5e6f...",
///   "status": "active",
///   "created_at": "2025-01-15T10:30:00Z",
///   "last_used_at": null,
///   "expires_at": null
/// }
/// ```
pub async fn create_api_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    meta: RequestMeta,
    payload: Result<Json<CreateApiKeyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let created =
        api_key_service::create_api_key(state.backend.as_ref(), auth.user_id, request).await?;

    state.activity.log(meta.stamp(
        NewActivityLog::new(Some(auth.user_id), ActivityCategory::Admin, "api_key_created")
            .with_details(json!({ "key_id": created.id, "name": created.name })),
    ));

    Ok((StatusCode::CREATED, Json(created)))
}

/// List the caller's keys, newest first. Raw keys are never included.
pub async fn list_api_keys(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<ApiKeyResponse>>, AppError> {
    let keys = api_key_service::list_api_keys(state.backend.as_ref(), auth.user_id).await?;
    Ok(Json(keys))
}

/// Revoke one of the caller's keys. 204 on success, 404 if not theirs.
pub async fn revoke_api_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    meta: RequestMeta,
    Path(key_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    api_key_service::revoke_api_key(state.backend.as_ref(), auth.user_id, key_id).await?;

    state.activity.log(meta.stamp(
        NewActivityLog::new(Some(auth.user_id), ActivityCategory::Admin, "api_key_revoked")
            .with_details(json!({ "key_id": key_id })),
    ));

    Ok(StatusCode::NO_CONTENT)
}
