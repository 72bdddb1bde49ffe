//! Admin purchase list kept on the client.
//!
//! After a successful status change the returned row replaces the cached one
//! by id; the list is not fetched again. Failures leave the cache untouched
//! and queue a [`Toast`] for the user. Nothing is retried.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use super::{ClientError, PurchaseApi};
use crate::backend::Backend;
use crate::middleware::request_meta::RequestMeta;
use crate::models::purchase::{Purchase, PurchaseFilter, UpdatePurchaseStatus};
use crate::services::{activity_logger::ActivityLogger, purchase_service};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
}

/// A short user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub kind: ToastKind,
    pub title: String,
    pub description: String,
}

impl Toast {
    fn success(description: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Success,
            title: "Готово".to_string(),
            description: description.into(),
        }
    }

    fn error(description: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Error,
            title: "Ошибка".to_string(),
            description: description.into(),
        }
    }
}

/// Runs purchase operations in process for one acting admin.
pub struct LocalPurchaseApi {
    backend: Arc<dyn Backend>,
    activity: ActivityLogger,
    actor_id: Uuid,
}

impl LocalPurchaseApi {
    pub fn new(backend: Arc<dyn Backend>, activity: ActivityLogger, actor_id: Uuid) -> Self {
        Self {
            backend,
            activity,
            actor_id,
        }
    }
}

#[async_trait]
impl PurchaseApi for LocalPurchaseApi {
    async fn list_purchases(&self, filter: &PurchaseFilter) -> Result<Vec<Purchase>, ClientError> {
        Ok(purchase_service::list_purchases(self.backend.as_ref(), filter).await?)
    }

    async fn update_purchase_status(
        &self,
        purchase_id: Uuid,
        request: &UpdatePurchaseStatus,
    ) -> Result<Purchase, ClientError> {
        Ok(purchase_service::update_purchase_status(
            self.backend.as_ref(),
            &self.activity,
            self.actor_id,
            &RequestMeta::default(),
            purchase_id,
            request.clone(),
        )
        .await?)
    }
}

pub struct PurchaseBoard {
    api: Arc<dyn PurchaseApi>,
    filter: PurchaseFilter,
    purchases: Vec<Purchase>,
    toasts: Vec<Toast>,
}

impl PurchaseBoard {
    pub fn new(api: Arc<dyn PurchaseApi>, filter: PurchaseFilter) -> Self {
        Self {
            api,
            filter,
            purchases: Vec::new(),
            toasts: Vec::new(),
        }
    }

    pub fn purchases(&self) -> &[Purchase] {
        &self.purchases
    }

    pub fn toasts(&self) -> &[Toast] {
        &self.toasts
    }

    pub fn take_toasts(&mut self) -> Vec<Toast> {
        std::mem::take(&mut self.toasts)
    }

    /// Reload the list. Only call this for an explicit user request.
    pub async fn refresh(&mut self) -> bool {
        match self.api.list_purchases(&self.filter).await {
            Ok(purchases) => {
                self.purchases = purchases;
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load purchases");
                self.toasts
                    .push(Toast::error("Не удалось загрузить список покупок"));
                false
            }
        }
    }

    /// Change a purchase's status and merge the server's row into the list.
    pub async fn update_status(
        &mut self,
        purchase_id: Uuid,
        request: UpdatePurchaseStatus,
    ) -> Option<Purchase> {
        match self.api.update_purchase_status(purchase_id, &request).await {
            Ok(updated) => {
                self.merge(updated.clone());
                self.toasts
                    .push(Toast::success("Статус покупки обновлён"));
                Some(updated)
            }
            Err(e) => {
                tracing::warn!(%purchase_id, error = %e, "purchase status update failed");
                self.toasts
                    .push(Toast::error("Не удалось обновить статус покупки"));
                None
            }
        }
    }

    /// Replace the cached row with the same id. Rows not in view are ignored.
    fn merge(&mut self, updated: Purchase) {
        if let Some(slot) = self.purchases.iter_mut().find(|p| p.id == updated.id) {
            *slot = updated;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::models::purchase::PurchaseStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts list calls to prove updates do not re-fetch.
    struct Counting {
        inner: LocalPurchaseApi,
        lists: AtomicUsize,
    }

    #[async_trait]
    impl PurchaseApi for Counting {
        async fn list_purchases(
            &self,
            filter: &PurchaseFilter,
        ) -> Result<Vec<Purchase>, ClientError> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            self.inner.list_purchases(filter).await
        }

        async fn update_purchase_status(
            &self,
            purchase_id: Uuid,
            request: &UpdatePurchaseStatus,
        ) -> Result<Purchase, ClientError> {
            self.inner.update_purchase_status(purchase_id, request).await
        }
    }

    struct Fixture {
        backend: Arc<MemoryBackend>,
        activity: ActivityLogger,
        api: Arc<Counting>,
        product: Uuid,
    }

    fn fixture() -> Fixture {
        let backend = Arc::new(MemoryBackend::new());
        let activity = ActivityLogger::for_backend(backend.clone());
        let api = Arc::new(Counting {
            inner: LocalPurchaseApi::new(backend.clone(), activity.clone(), Uuid::new_v4()),
            lists: AtomicUsize::new(0),
        });
        let product = backend.insert_product("Gold pass");
        Fixture {
            backend,
            activity,
            api,
            product,
        }
    }

    #[tokio::test]
    async fn update_merges_without_refetch() {
        let fx = fixture();
        let first = fx
            .backend
            .insert_purchase(Uuid::new_v4(), fx.product, PurchaseStatus::Pending);
        let second = fx
            .backend
            .insert_purchase(Uuid::new_v4(), fx.product, PurchaseStatus::Pending);
        let mut board = PurchaseBoard::new(fx.api.clone(), PurchaseFilter::default());
        assert!(board.refresh().await);
        assert_eq!(board.purchases().len(), 2);

        let updated = board
            .update_status(
                first.id,
                UpdatePurchaseStatus {
                    status: PurchaseStatus::Completed,
                    product_id: Some(fx.product),
                },
            )
            .await
            .unwrap();
        fx.activity.flush().await;

        assert_eq!(fx.api.lists.load(Ordering::SeqCst), 1);
        let cached = board.purchases().iter().find(|p| p.id == first.id).unwrap();
        assert_eq!(cached, &updated);
        assert_eq!(cached.status, "completed");
        let untouched = board.purchases().iter().find(|p| p.id == second.id).unwrap();
        assert_eq!(untouched.status, "pending");

        assert_eq!(board.take_toasts()[0].kind, ToastKind::Success);
        let rows = fx.backend.activity_logs();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].action, "purchase_status_updated");
    }

    #[tokio::test]
    async fn failed_update_leaves_cache_and_shows_toast() {
        let fx = fixture();
        let purchase = fx
            .backend
            .insert_purchase(Uuid::new_v4(), fx.product, PurchaseStatus::Pending);
        let mut board = PurchaseBoard::new(fx.api.clone(), PurchaseFilter::default());
        board.refresh().await;
        let before = board.purchases().to_vec();
        fx.backend.set_fail_purchase_updates(true);

        let result = board
            .update_status(
                purchase.id,
                UpdatePurchaseStatus {
                    status: PurchaseStatus::Cancelled,
                    product_id: None,
                },
            )
            .await;
        fx.activity.flush().await;

        assert!(result.is_none());
        assert_eq!(board.purchases(), before.as_slice());
        assert_eq!(
            board.toasts(),
            &[Toast {
                kind: ToastKind::Error,
                title: "Ошибка".to_string(),
                description: "Не удалось обновить статус покупки".to_string(),
            }]
        );
        assert!(fx.backend.activity_logs().is_empty());
        assert_eq!(fx.api.lists.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_purchase_is_reported() {
        let fx = fixture();
        let mut board = PurchaseBoard::new(fx.api.clone(), PurchaseFilter::default());

        let result = board
            .update_status(
                Uuid::new_v4(),
                UpdatePurchaseStatus {
                    status: PurchaseStatus::Completed,
                    product_id: None,
                },
            )
            .await;

        assert!(result.is_none());
        assert_eq!(board.take_toasts().len(), 1);
        assert!(board.toasts().is_empty());
    }
}
