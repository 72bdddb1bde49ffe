//! Administrative endpoints.
//!
//! - POST /create-admin - provision the first administrator (setup token)
//! - POST /delete-user - delete an identity (admin session)
//! - GET /admin/users - list member profiles
//!
//! The first two answer every failure with 400 and `{error}`.

use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    backend::IdentityStore,
    error::{AdminEndpointError, AppError},
    middleware::{auth::bearer_token, request_meta::RequestMeta},
    models::{
        activity_log::{ActivityCategory, NewActivityLog},
        user::{CreateAdminRequest, DeleteUserRequest, Profile},
    },
    services::identity_service,
    state::AppState,
};

pub const SETUP_TOKEN_HEADER: &str = "x-setup-token";

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// `POST /create-admin`
///
/// # Headers
///
/// `x-setup-token: <BOOTSTRAP_TOKEN>`
///
/// # Request Body
///
/// ```json
/// { "email": "owner@club.example", "password": "...", "display_name": "Owner" }
/// ```
///
/// Works only while no administrator exists.
pub async fn create_admin(
    State(state): State<AppState>,
    meta: RequestMeta,
    headers: HeaderMap,
    payload: Result<Json<CreateAdminRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AdminEndpointError> {
    let Json(request) = payload?;
    let presented = headers
        .get(SETUP_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim);

    let outcome = identity_service::bootstrap_admin(
        state.backend.as_ref(),
        state.config.bootstrap_token(),
        presented,
        request,
    )
    .await?;

    state.activity.log(meta.stamp(
        NewActivityLog::new(
            Some(outcome.user_id()),
            ActivityCategory::Admin,
            "admin_bootstrapped",
        )
        .with_details(json!({ "outcome": outcome.message() })),
    ));

    Ok(Json(MessageResponse {
        message: outcome.message().to_string(),
    }))
}

/// `POST /delete-user`
///
/// # Headers
///
/// `Authorization: Bearer <session token>` of an administrator
///
/// # Request Body
///
/// ```json
/// { "userId": "550e8400-e29b-41d4-a716-446655440000" }
/// ```
pub async fn delete_user(
    State(state): State<AppState>,
    meta: RequestMeta,
    headers: HeaderMap,
    payload: Result<Json<DeleteUserRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AdminEndpointError> {
    let Json(request) = payload?;
    let token = bearer_token(&headers)
        .ok_or_else(|| AppError::Unauthorized("No authorization header".to_string()))?;

    let admin_id =
        identity_service::delete_user(state.backend.as_ref(), token, request.user_id).await?;

    state.activity.log(meta.stamp(
        NewActivityLog::new(Some(admin_id), ActivityCategory::Admin, "user_deleted")
            .with_details(json!({ "deleted_user_id": request.user_id })),
    ));

    Ok(Json(SuccessResponse { success: true }))
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub limit: Option<i64>,
}

/// `GET /admin/users` - newest members first.
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<Profile>>, AppError> {
    let profiles = state
        .backend
        .list_profiles(crate::backend::clamp_limit(query.limit))
        .await?;
    Ok(Json(profiles))
}
