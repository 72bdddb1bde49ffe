//! Storage seam between the services and the database.
//!
//! Each concern gets its own store trait. [`Backend`] bundles them so
//! handlers can share one `Arc<dyn Backend>`. [`PgBackend`] is the
//! production implementation; [`MemoryBackend`] keeps everything in process
//! and backs the test suite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    activity_log::{ActivityLog, ActivityLogFilter, NewActivityLog},
    api_key::{ApiKey, NewApiKey},
    purchase::{Purchase, PurchaseFilter, PurchaseStatus},
    user::{NewIdentity, Profile, SessionRecord, UserCredentials},
};

mod memory;
mod postgres;

pub use memory::MemoryBackend;
pub use postgres::PgBackend;

/// Rows returned by list queries when the caller gives no limit.
pub const DEFAULT_LIST_LIMIT: i64 = 100;
/// Upper bound on any list query.
pub const MAX_LIST_LIMIT: i64 = 500;

/// Clamp a caller-supplied limit into `1..=MAX_LIST_LIMIT`.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

/// Identities (credentials + profile) and their sessions.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Insert credentials and the initial profile.
    ///
    /// Fails with [`AppError::Conflict`] when the email is taken.
    async fn create_identity(&self, identity: NewIdentity) -> Result<Profile, AppError>;

    async fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, AppError>;

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>, AppError>;

    async fn list_profiles(&self, limit: i64) -> Result<Vec<Profile>, AppError>;

    /// Delete an identity with its profile, roles, sessions and keys.
    /// Returns false when no such identity exists.
    async fn delete_identity(&self, user_id: Uuid) -> Result<bool, AppError>;

    async fn create_session(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord, AppError>;

    async fn find_session(&self, token_hash: &str) -> Result<Option<SessionRecord>, AppError>;

    async fn delete_session(&self, token_hash: &str) -> Result<bool, AppError>;
}

/// Role lookups. `is_admin` is the remote procedure of the same name.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn is_admin(&self, user_id: Uuid) -> Result<bool, AppError>;

    /// Grant the admin role only if no admin exists yet, as one atomic step.
    /// Returns false when another admin got there first.
    async fn grant_first_admin(&self, user_id: Uuid) -> Result<bool, AppError>;

    async fn admin_exists(&self) -> Result<bool, AppError>;
}

#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, AppError>;

    async fn insert_api_key(&self, key: NewApiKey) -> Result<ApiKey, AppError>;

    async fn list_api_keys(&self, owner_id: Uuid) -> Result<Vec<ApiKey>, AppError>;

    /// Set `is_active = false` on a key owned by `owner_id`.
    /// Returns false when the key does not exist or belongs to someone else.
    async fn revoke_api_key(&self, owner_id: Uuid, key_id: Uuid) -> Result<bool, AppError>;

    async fn touch_api_key(&self, key_id: Uuid) -> Result<(), AppError>;
}

#[async_trait]
pub trait PurchaseStore: Send + Sync {
    /// Newest first.
    async fn list_purchases(&self, filter: &PurchaseFilter) -> Result<Vec<Purchase>, AppError>;

    async fn find_purchase(&self, purchase_id: Uuid) -> Result<Option<Purchase>, AppError>;

    /// Returns the updated row, or `None` when the purchase does not exist.
    async fn update_purchase_status(
        &self,
        purchase_id: Uuid,
        status: PurchaseStatus,
    ) -> Result<Option<Purchase>, AppError>;
}

/// Append-only activity log.
#[async_trait]
pub trait ActivityLogStore: Send + Sync {
    async fn insert_activity(&self, entry: NewActivityLog) -> Result<ActivityLog, AppError>;

    /// Newest first.
    async fn list_activity(&self, filter: &ActivityLogFilter) -> Result<Vec<ActivityLog>, AppError>;
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Round trip to the underlying store.
    async fn ping(&self) -> Result<(), AppError>;
}

/// Everything the HTTP layer needs from storage.
pub trait Backend:
    IdentityStore + RoleStore + ApiKeyStore + PurchaseStore + ActivityLogStore + HealthCheck
{
}

impl<T> Backend for T where
    T: IdentityStore + RoleStore + ApiKeyStore + PurchaseStore + ActivityLogStore + HealthCheck
{
}
