//! Identity endpoints.
//!
//! - POST /auth/sign-up
//! - POST /auth/sign-in
//! - POST /auth/refresh
//! - POST /auth/sign-out
//! - GET /auth/session
//! - GET /me

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::{
    backend::IdentityStore,
    error::AppError,
    middleware::auth::{AuthContext, bearer_token},
    models::user::{CurrentSessionResponse, Identity, Profile, SessionResponse, SignInRequest, SignUpRequest},
    services::identity_service,
    state::AppState,
};

fn require_bearer(headers: &HeaderMap) -> Result<&str, AppError> {
    bearer_token(headers).ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))
}

/// `POST /auth/sign-up` - returns 201 with the new profile.
pub async fn sign_up(
    State(state): State<AppState>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let profile = identity_service::sign_up(state.backend.as_ref(), request).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// `POST /auth/sign-in`
///
/// # Response
///
/// ```json
/// {
///   "access_token": "9f86d081884c7d65...",
///   "expires_at": "2025-12-28T10:00:00Z",
///   "user": { "id": "...", "email": "member@club.example", ... }
/// }
/// ```
pub async fn sign_in(
    State(state): State<AppState>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> Result<Json<SessionResponse>, AppError> {
    let Json(request) = payload?;
    let session =
        identity_service::sign_in(state.backend.as_ref(), state.session_ttl(), request).await?;
    tracing::info!(user_id = %session.user.id, "signed in");
    Ok(Json(session))
}

/// `POST /auth/refresh` - swap the bearer token for a fresh one.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, AppError> {
    let token = require_bearer(&headers)?;
    let session =
        identity_service::refresh_session(state.backend.as_ref(), token, state.session_ttl())
            .await?;
    Ok(Json(session))
}

/// `POST /auth/sign-out` - 204 on success.
pub async fn sign_out(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let token = require_bearer(&headers)?;
    identity_service::sign_out(state.backend.as_ref(), token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /auth/session` - the identity behind the bearer token, or 401.
pub async fn current_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CurrentSessionResponse>, AppError> {
    let token = require_bearer(&headers)?;
    let user: Identity = identity_service::resolve_session(state.backend.as_ref(), token).await?;
    Ok(Json(CurrentSessionResponse { user }))
}

/// `GET /me` - full profile of the signed-in member.
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Profile>, AppError> {
    let profile = state
        .backend
        .find_profile(auth.user_id)
        .await?
        .ok_or(AppError::NotFound("Profile"))?;
    Ok(Json(profile))
}
