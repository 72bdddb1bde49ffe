//! `GET /health` for load balancers and uptime checks.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{backend::HealthCheck, error::AppError, state::AppState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,

    /// Backend reachability; only ever "connected" in a 200 response
    pub database: &'static str,

    pub version: &'static str,

    pub timestamp: DateTime<Utc>,
}

/// Ping the backend and report.
///
/// ```json
/// { "status": "healthy", "database": "connected", "version": "0.1.0", "timestamp": "..." }
/// ```
///
/// An unreachable backend yields the usual 500 error body.
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    state.backend.ping().await?;

    Ok(Json(HealthResponse {
        status: "healthy",
        database: "connected",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
    }))
}
