//! Activity log model.
//!
//! The activity log is an append-only audit trail. Rows are inserted by the
//! [`ActivityLogger`](crate::services::activity_logger::ActivityLogger) and
//! never updated or deleted.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category an activity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityCategory {
    Auth,
    Admin,
    Points,
    Rewards,
    Shop,
    Passes,
    User,
    System,
}

impl ActivityCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityCategory::Auth => "auth",
            ActivityCategory::Admin => "admin",
            ActivityCategory::Points => "points",
            ActivityCategory::Rewards => "rewards",
            ActivityCategory::Shop => "shop",
            ActivityCategory::Passes => "passes",
            ActivityCategory::User => "user",
            ActivityCategory::System => "system",
        }
    }
}

impl fmt::Display for ActivityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auth" => Ok(ActivityCategory::Auth),
            "admin" => Ok(ActivityCategory::Admin),
            "points" => Ok(ActivityCategory::Points),
            "rewards" => Ok(ActivityCategory::Rewards),
            "shop" => Ok(ActivityCategory::Shop),
            "passes" => Ok(ActivityCategory::Passes),
            "user" => Ok(ActivityCategory::User),
            "system" => Ok(ActivityCategory::System),
            other => Err(format!("Unknown activity category: {}", other)),
        }
    }
}

/// A stored activity log row.
///
/// `category` is kept as text, matching the column.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub category: String,
    pub action: String,
    pub details: serde_json::Value,
    pub hostname: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An entry waiting to be written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivityLog {
    pub user_id: Option<Uuid>,
    pub category: ActivityCategory,
    pub action: String,
    #[serde(default = "empty_details")]
    pub details: serde_json::Value,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn empty_details() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

impl NewActivityLog {
    pub fn new(user_id: Option<Uuid>, category: ActivityCategory, action: impl Into<String>) -> Self {
        Self {
            user_id,
            category,
            action: action.into(),
            details: empty_details(),
            hostname: None,
            user_agent: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Attach client-observed metadata (originating host and user agent).
    pub fn with_origin(mut self, hostname: Option<String>, user_agent: Option<String>) -> Self {
        self.hostname = hostname;
        self.user_agent = user_agent;
        self
    }
}

/// Request body for `POST /activity-logs`.
///
/// The user id is always the caller's; it cannot be supplied.
#[derive(Debug, Deserialize, Serialize)]
pub struct ClientActivityRequest {
    pub category: ActivityCategory,
    pub action: String,
    #[serde(default = "empty_details")]
    pub details: serde_json::Value,
}

/// Query parameters for `GET /admin/activity-logs`.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ActivityLogFilter {
    pub category: Option<ActivityCategory>,
    pub user_id: Option<Uuid>,
    pub limit: Option<i64>,
}
