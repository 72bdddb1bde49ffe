//! Admin purchase endpoints.
//!
//! - GET /admin/purchases?status=&user_id=&limit=
//! - PATCH /admin/purchases/{id}/status

use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::{auth::AuthContext, request_meta::RequestMeta},
    models::purchase::{Purchase, PurchaseFilter, UpdatePurchaseStatus},
    services::purchase_service,
    state::AppState,
};

/// List purchases, newest first.
pub async fn list_purchases(
    State(state): State<AppState>,
    Query(filter): Query<PurchaseFilter>,
) -> Result<Json<Vec<Purchase>>, AppError> {
    let purchases = purchase_service::list_purchases(state.backend.as_ref(), &filter).await?;
    Ok(Json(purchases))
}

/// Update a purchase's status and return the updated row.
///
/// # Request Body
///
/// ```json
/// { "status": "completed", "product_id": "660e8400-e29b-41d4-a716-446655440001" }
/// ```
///
/// # Response
///
/// - **200**: the updated purchase
/// - **404**: unknown purchase
/// - **400**: `product_id` does not match
pub async fn update_purchase_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    meta: RequestMeta,
    Path(purchase_id): Path<Uuid>,
    payload: Result<Json<UpdatePurchaseStatus>, JsonRejection>,
) -> Result<Json<Purchase>, AppError> {
    let Json(request) = payload?;
    let purchase = purchase_service::update_purchase_status(
        state.backend.as_ref(),
        &state.activity,
        auth.user_id,
        &meta,
        purchase_id,
        request,
    )
    .await?;

    Ok(Json(purchase))
}
