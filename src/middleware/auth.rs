//! Authentication middleware.
//!
//! Two credentials are accepted:
//! - `Authorization: Bearer <session token>` issued by `/auth/sign-in`
//! - `x-api-key: <key>` for automated/admin access
//!
//! On success an [`AuthContext`] is inserted into the request extensions.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    backend::RoleStore,
    error::AppError,
    services::{api_key_service, identity_service},
    state::AppState,
};

pub const API_KEY_HEADER: &str = "x-api-key";

/// How the caller authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Session,
    ApiKey,
}

/// Authentication context attached to authenticated requests.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub method: AuthMethod,
    pub is_admin: bool,
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub fn api_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
}

/// Require a valid session token.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    let identity = identity_service::resolve_session(state.backend.as_ref(), token).await?;

    request.extensions_mut().insert(AuthContext {
        user_id: identity.id,
        method: AuthMethod::Session,
        is_admin: false,
    });

    Ok(next.run(request).await)
}

/// Require an administrator, by API key or by session.
///
/// # Flow
///
/// 1. With `x-api-key`: the key must be valid (401) and its owner admin (403)
/// 2. Otherwise with a bearer token: the session must be valid (401) and
///    `is_admin(owner)` must hold (403)
/// 3. Neither header: 401
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let context = if let Some(key) = api_key(request.headers()) {
        let validation = api_key_service::validate_api_key(state.backend.as_ref(), key).await;
        let owner = validation
            .owner_id
            .filter(|_| validation.is_valid)
            .ok_or(AppError::InvalidApiKey)?;
        if !validation.is_admin {
            return Err(AppError::Forbidden);
        }
        AuthContext {
            user_id: owner,
            method: AuthMethod::ApiKey,
            is_admin: true,
        }
    } else {
        let token = bearer_token(request.headers())
            .ok_or_else(|| AppError::Unauthorized("Missing credentials".to_string()))?;
        let identity = identity_service::resolve_session(state.backend.as_ref(), token).await?;
        if !state.backend.is_admin(identity.id).await? {
            return Err(AppError::Forbidden);
        }
        AuthContext {
            user_id: identity.id,
            method: AuthMethod::Session,
            is_admin: true,
        }
    };

    tracing::debug!(user_id = %context.user_id, method = ?context.method, "admin request");
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}
