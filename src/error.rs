//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error code.
///
/// # Error Categories
///
/// - **Transport/Database**: any failure talking to PostgreSQL
/// - **Invalid credential**: unknown, revoked or expired API keys, bad sessions
/// - **Authorization denied**: valid credential without the admin role
/// - **Validation**: malformed writes
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// API key is missing, unknown, inactive or expired.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Session token is missing, unknown or expired, or the password is wrong.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("{0}")]
    Unauthorized(String),

    /// The caller is authenticated but lacks the admin role.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Admin privileges required")]
    Forbidden,

    /// The named resource does not exist (or is not visible to the caller).
    ///
    /// Returns HTTP 404 Not Found.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The write conflicts with existing state (duplicate email, admin already provisioned).
    ///
    /// Returns HTTP 409 Conflict.
    #[error("{0}")]
    Conflict(String),

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("{0}")]
    InvalidRequest(String),

    /// Password hashing failed.
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) | AppError::PasswordHash(_) => "internal_error",
            AppError::InvalidApiKey => "invalid_api_key",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::InvalidRequest(_) => "invalid_request",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidApiKey | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show to clients. Internal failures are not described.
    fn public_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::PasswordHash(_) => {
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// { "error": "Human-readable error message", "code": "error_type" }
/// ```
///
/// # Status Code Mapping
///
/// - `InvalidApiKey`, `Unauthorized` → 401
/// - `Forbidden` → 403
/// - `NotFound` → 404
/// - `Conflict` → 409
/// - `InvalidRequest` → 400
/// - `Database`, `PasswordHash` → 500 (details are logged, not returned)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, AppError::Database(_) | AppError::PasswordHash(_)) {
            tracing::error!(error = %self, "request failed");
        }
        let status = self.status();
        error_body(status, self.code(), self.public_message())
    }
}

/// Malformed or mistyped JSON bodies (unknown purchase status, missing
/// fields) become 400 with the usual error body.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// Error wrapper for the administrative endpoints (`/create-admin`, `/delete-user`).
///
/// These endpoints answer every failure with `400` and an `{error}` body,
/// whatever the underlying cause.
#[derive(Debug)]
pub struct AdminEndpointError(pub AppError);

impl From<AppError> for AdminEndpointError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<sqlx::Error> for AdminEndpointError {
    fn from(err: sqlx::Error) -> Self {
        Self(AppError::Database(err))
    }
}

impl From<JsonRejection> for AdminEndpointError {
    fn from(rejection: JsonRejection) -> Self {
        Self(rejection.into())
    }
}

impl IntoResponse for AdminEndpointError {
    fn into_response(self) -> Response {
        let inner = self.0;
        tracing::warn!(error = %inner, "administrative request rejected");
        error_body(StatusCode::BAD_REQUEST, inner.code(), inner.public_message())
    }
}

fn error_body(status: StatusCode, code: &str, message: String) -> Response {
    let body = Json(json!({
        "error": message,
        "code": code,
    }));

    (status, body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(AppError::InvalidApiKey.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound("Purchase").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::InvalidRequest("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn database_errors_hide_details() {
        let err = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.public_message(), "An internal error occurred");
        assert_eq!(err.code(), "internal_error");
    }

    #[test]
    fn admin_endpoint_errors_are_bad_request() {
        let response = AdminEndpointError(AppError::Forbidden).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
