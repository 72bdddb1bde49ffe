//! Admin purchase management.

use serde_json::json;
use uuid::Uuid;

use crate::backend::PurchaseStore;
use crate::error::AppError;
use crate::middleware::request_meta::RequestMeta;
use crate::models::{
    activity_log::{ActivityCategory, NewActivityLog},
    purchase::{Purchase, PurchaseFilter, UpdatePurchaseStatus},
};
use crate::services::activity_logger::ActivityLogger;

pub async fn list_purchases<S>(store: &S, filter: &PurchaseFilter) -> Result<Vec<Purchase>, AppError>
where
    S: PurchaseStore + ?Sized,
{
    store.list_purchases(filter).await
}

/// Set the status of a purchase and record it in the activity log.
///
/// # Process
///
/// 1. Load the purchase (404 if missing)
/// 2. If a `product_id` is supplied it must match the purchase
/// 3. Update the status and return the updated row
/// 4. Enqueue one `shop/purchase_status_updated` entry
///
/// Nothing is logged when the update fails.
pub async fn update_purchase_status<S>(
    store: &S,
    activity: &ActivityLogger,
    actor_id: Uuid,
    meta: &RequestMeta,
    purchase_id: Uuid,
    request: UpdatePurchaseStatus,
) -> Result<Purchase, AppError>
where
    S: PurchaseStore + ?Sized,
{
    let previous = store
        .find_purchase(purchase_id)
        .await?
        .ok_or(AppError::NotFound("Purchase"))?;

    if let Some(product_id) = request.product_id {
        if product_id != previous.product_id {
            return Err(AppError::InvalidRequest(
                "product_id does not match the purchase".to_string(),
            ));
        }
    }

    let updated = store
        .update_purchase_status(purchase_id, request.status)
        .await?
        .ok_or(AppError::NotFound("Purchase"))?;

    activity.log(meta.stamp(
        NewActivityLog::new(
            Some(actor_id),
            ActivityCategory::Shop,
            "purchase_status_updated",
        )
        .with_details(json!({
            "purchase_id": updated.id,
            "product_id": updated.product_id,
            "buyer_id": updated.user_id,
            "previous_status": previous.status,
            "status": updated.status,
        })),
    ));

    tracing::info!(
        purchase_id = %updated.id,
        from = %previous.status,
        to = %updated.status,
        "purchase status updated"
    );

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::models::purchase::PurchaseStatus;
    use std::sync::Arc;

    #[tokio::test]
    async fn update_logs_exactly_one_shop_entry() {
        let backend = Arc::new(MemoryBackend::new());
        let logger = ActivityLogger::for_backend(backend.clone());
        let product = backend.insert_product("Gold pass");
        let purchase = backend.insert_purchase(Uuid::new_v4(), product, PurchaseStatus::Pending);
        let admin = Uuid::new_v4();
        let meta = RequestMeta {
            hostname: Some("admin.club.test".to_string()),
            user_agent: Some("test-agent".to_string()),
        };

        let updated = update_purchase_status(
            backend.as_ref(),
            &logger,
            admin,
            &meta,
            purchase.id,
            UpdatePurchaseStatus {
                status: PurchaseStatus::Completed,
                product_id: Some(product),
            },
        )
        .await
        .unwrap();
        logger.flush().await;

        assert_eq!(updated.status, "completed");
        let rows = backend.activity_logs();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].category, "shop");
        assert_eq!(rows[0].user_id, Some(admin));
        assert_eq!(rows[0].hostname.as_deref(), Some("admin.club.test"));
        assert_eq!(rows[0].details["previous_status"], "pending");
        assert_eq!(rows[0].details["status"], "completed");
    }

    #[tokio::test]
    async fn failed_update_logs_nothing() {
        let backend = Arc::new(MemoryBackend::new());
        let logger = ActivityLogger::for_backend(backend.clone());
        let product = backend.insert_product("Gold pass");
        let purchase = backend.insert_purchase(Uuid::new_v4(), product, PurchaseStatus::Pending);

        let missing = update_purchase_status(
            backend.as_ref(),
            &logger,
            Uuid::new_v4(),
            &RequestMeta::default(),
            Uuid::new_v4(),
            UpdatePurchaseStatus {
                status: PurchaseStatus::Completed,
                product_id: None,
            },
        )
        .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        let mismatched = update_purchase_status(
            backend.as_ref(),
            &logger,
            Uuid::new_v4(),
            &RequestMeta::default(),
            purchase.id,
            UpdatePurchaseStatus {
                status: PurchaseStatus::Cancelled,
                product_id: Some(Uuid::new_v4()),
            },
        )
        .await;
        assert!(matches!(mismatched, Err(AppError::InvalidRequest(_))));

        logger.flush().await;
        assert!(backend.activity_logs().is_empty());
    }
}
