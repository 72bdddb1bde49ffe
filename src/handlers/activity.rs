//! Activity log endpoints.
//!
//! - POST /activity-logs - a signed-in client appends its own entry
//! - GET /admin/activity-logs?category=&user_id=&limit=

use axum::{
    Extension, Json,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
};

use crate::{
    backend::ActivityLogStore,
    error::AppError,
    middleware::{auth::AuthContext, request_meta::RequestMeta},
    models::activity_log::{ActivityLog, ActivityLogFilter, ClientActivityRequest, NewActivityLog},
    state::AppState,
};

const MAX_ACTION_LEN: usize = 100;

/// Accept an entry from a client. The write happens in the background, so
/// the response is 202 whether or not it later succeeds.
pub async fn record_activity(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    meta: RequestMeta,
    payload: Result<Json<ClientActivityRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let Json(request) = payload?;
    let action = request.action.trim();
    if action.is_empty() || action.len() > MAX_ACTION_LEN {
        return Err(AppError::InvalidRequest(format!(
            "action must be 1 to {} characters",
            MAX_ACTION_LEN
        )));
    }
    if !request.details.is_object() {
        return Err(AppError::InvalidRequest(
            "details must be a JSON object".to_string(),
        ));
    }

    state.activity.log(meta.stamp(
        NewActivityLog::new(Some(auth.user_id), request.category, action)
            .with_details(request.details),
    ));

    Ok(StatusCode::ACCEPTED)
}

pub async fn list_activity(
    State(state): State<AppState>,
    Query(filter): Query<ActivityLogFilter>,
) -> Result<Json<Vec<ActivityLog>>, AppError> {
    let rows = state.backend.list_activity(&filter).await?;
    Ok(Json(rows))
}
