//! `POST /api-auth`: API key check for automated clients.

use axum::{Json, extract::State, http::HeaderMap};

use crate::{
    error::AppError,
    middleware::auth::api_key,
    models::api_key::ApiAuthResponse,
    services::api_key_service,
    state::AppState,
};

/// Validate the `x-api-key` header.
///
/// # Response
///
/// - **200**: `{ "success": true, "user_id": "...", "is_admin": false }`
/// - **401**: `{ "error": "Invalid API key", "code": "invalid_api_key" }` for a
///   missing, unknown, revoked or expired key
pub async fn authenticate(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiAuthResponse>, AppError> {
    let key = api_key(&headers).ok_or(AppError::InvalidApiKey)?;

    let validation = api_key_service::validate_api_key(state.backend.as_ref(), key).await;
    let user_id = validation
        .owner_id
        .filter(|_| validation.is_valid)
        .ok_or(AppError::InvalidApiKey)?;

    Ok(Json(ApiAuthResponse {
        success: true,
        user_id,
        is_admin: validation.is_admin,
    }))
}
