//! Purchase data models and admin request types.
//!
//! Purchases are created by the checkout flow. The only field this service
//! mutates is `status`, through the admin status update.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fulfillment status of a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Cancelled,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Completed => "completed",
            PurchaseStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PurchaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PurchaseStatus::Pending),
            "completed" => Ok(PurchaseStatus::Completed),
            "cancelled" => Ok(PurchaseStatus::Cancelled),
            other => Err(format!("Unknown purchase status: {}", other)),
        }
    }
}

/// Represents a purchase row joined with its product name.
///
/// # Database Table
///
/// Maps to `purchases` joined with `products` on `product_id`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct Purchase {
    pub id: Uuid,

    pub user_id: Uuid,

    pub product_id: Uuid,

    /// Name of the purchased product (from `products`)
    pub product_name: String,

    /// "pending", "completed" or "cancelled"
    pub status: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Request body for `PATCH /admin/purchases/{id}/status`.
///
/// # JSON Example
///
/// ```json
/// { "status": "completed", "product_id": "550e8400-e29b-41d4-a716-446655440000" }
/// ```
///
/// When `product_id` is present it must match the purchase's product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePurchaseStatus {
    pub status: PurchaseStatus,
    #[serde(default)]
    pub product_id: Option<Uuid>,
}

/// Query parameters for `GET /admin/purchases`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PurchaseFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PurchaseStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}
