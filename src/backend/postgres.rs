//! PostgreSQL implementation of the store traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    ActivityLogStore, ApiKeyStore, HealthCheck, IdentityStore, PurchaseStore, RoleStore,
    clamp_limit,
};
use crate::db::DbPool;
use crate::error::AppError;
use crate::models::{
    activity_log::{ActivityLog, ActivityLogFilter, NewActivityLog},
    api_key::{ApiKey, NewApiKey},
    purchase::{Purchase, PurchaseFilter, PurchaseStatus},
    user::{NewIdentity, Profile, SessionRecord, UserCredentials},
};

const PROFILE_COLUMNS: &str = "id, email, display_name, phone, level, points, status, has_pass, created_at, updated_at";

const API_KEY_COLUMNS: &str = "id, name, description, key_hash, key_prefix, user_id, created_at, last_used_at, expires_at, is_active";

const ACTIVITY_COLUMNS: &str = "id, user_id, category, action, details, hostname, user_agent, created_at";

/// Store backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgBackend {
    pool: DbPool,
}

impl PgBackend {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HealthCheck for PgBackend {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl IdentityStore for PgBackend {
    async fn create_identity(&self, identity: NewIdentity) -> Result<Profile, AppError> {
        let mut tx = self.pool.begin().await?;

        let user_id: Uuid = sqlx::query_scalar(
            "INSERT INTO users (email, password_hash) VALUES ($1, $2) RETURNING id",
        )
        .bind(&identity.email)
        .bind(&identity.password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Email is already registered".to_string())
            } else {
                AppError::Database(e)
            }
        })?;

        let profile = sqlx::query_as::<_, Profile>(&format!(
            r#"
            INSERT INTO profiles (id, email, display_name, phone)
            VALUES ($1, $2, $3, $4)
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&identity.email)
        .bind(&identity.display_name)
        .bind(&identity.phone)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(profile)
    }

    async fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, AppError> {
        let credentials = sqlx::query_as::<_, UserCredentials>(
            "SELECT id, email, password_hash, created_at FROM users WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credentials)
    }

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>, AppError> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn list_profiles(&self, limit: i64) -> Result<Vec<Profile>, AppError> {
        let profiles = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(clamp_limit(Some(limit)))
        .fetch_all(&self.pool)
        .await?;

        Ok(profiles)
    }

    async fn delete_identity(&self, user_id: Uuid) -> Result<bool, AppError> {
        // profiles, user_roles, sessions and api_keys cascade
        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord, AppError> {
        let session = sqlx::query_as::<_, SessionRecord>(
            r#"
            INSERT INTO sessions (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token_hash, created_at, expires_at
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<SessionRecord>, AppError> {
        let session = sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT id, user_id, token_hash, created_at, expires_at
            FROM sessions
            WHERE token_hash = $1 AND expires_at > NOW()
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn delete_session(&self, token_hash: &str) -> Result<bool, AppError> {
        let deleted = sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }
}

#[async_trait]
impl RoleStore for PgBackend {
    async fn is_admin(&self, user_id: Uuid) -> Result<bool, AppError> {
        let is_admin: bool = sqlx::query_scalar("SELECT is_admin($1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(is_admin)
    }

    async fn grant_first_admin(&self, user_id: Uuid) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent bootstraps; released at commit.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext('bootstrap_admin'))")
            .execute(&mut *tx)
            .await?;

        let granted = sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role)
            SELECT $1, 'admin'
            WHERE NOT EXISTS (SELECT 1 FROM user_roles WHERE role = 'admin')
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        Ok(granted == 1)
    }

    async fn admin_exists(&self) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM user_roles WHERE role = 'admin')")
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }
}

#[async_trait]
impl ApiKeyStore for PgBackend {
    async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, AppError> {
        let key = sqlx::query_as::<_, ApiKey>(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE key_hash = $1"
        ))
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(key)
    }

    async fn insert_api_key(&self, key: NewApiKey) -> Result<ApiKey, AppError> {
        let key = sqlx::query_as::<_, ApiKey>(&format!(
            r#"
            INSERT INTO api_keys (name, description, key_hash, key_prefix, user_id, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {API_KEY_COLUMNS}
            "#
        ))
        .bind(&key.name)
        .bind(&key.description)
        .bind(&key.key_hash)
        .bind(&key.key_prefix)
        .bind(key.user_id)
        .bind(key.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("API key already exists".to_string())
            } else {
                AppError::Database(e)
            }
        })?;

        Ok(key)
    }

    async fn list_api_keys(&self, owner_id: Uuid) -> Result<Vec<ApiKey>, AppError> {
        let keys = sqlx::query_as::<_, ApiKey>(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(keys)
    }

    async fn revoke_api_key(&self, owner_id: Uuid, key_id: Uuid) -> Result<bool, AppError> {
        let updated =
            sqlx::query("UPDATE api_keys SET is_active = false WHERE id = $1 AND user_id = $2")
                .bind(key_id)
                .bind(owner_id)
                .execute(&self.pool)
                .await?
                .rows_affected();

        Ok(updated > 0)
    }

    async fn touch_api_key(&self, key_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = $1")
            .bind(key_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl PurchaseStore for PgBackend {
    async fn list_purchases(&self, filter: &PurchaseFilter) -> Result<Vec<Purchase>, AppError> {
        let purchases = sqlx::query_as::<_, Purchase>(
            r#"
            SELECT p.id, p.user_id, p.product_id, pr.name AS product_name,
                   p.status, p.created_at, p.updated_at
            FROM purchases p
            JOIN products pr ON pr.id = p.product_id
            WHERE ($1::text IS NULL OR p.status = $1)
              AND ($2::uuid IS NULL OR p.user_id = $2)
            ORDER BY p.created_at DESC
            LIMIT $3
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.user_id)
        .bind(clamp_limit(filter.limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(purchases)
    }

    async fn find_purchase(&self, purchase_id: Uuid) -> Result<Option<Purchase>, AppError> {
        let purchase = sqlx::query_as::<_, Purchase>(
            r#"
            SELECT p.id, p.user_id, p.product_id, pr.name AS product_name,
                   p.status, p.created_at, p.updated_at
            FROM purchases p
            JOIN products pr ON pr.id = p.product_id
            WHERE p.id = $1
            "#,
        )
        .bind(purchase_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(purchase)
    }

    async fn update_purchase_status(
        &self,
        purchase_id: Uuid,
        status: PurchaseStatus,
    ) -> Result<Option<Purchase>, AppError> {
        let purchase = sqlx::query_as::<_, Purchase>(
            r#"
            WITH updated AS (
                UPDATE purchases
                SET status = $1,
                    updated_at = NOW()
                WHERE id = $2
                RETURNING id, user_id, product_id, status, created_at, updated_at
            )
            SELECT u.id, u.user_id, u.product_id, pr.name AS product_name,
                   u.status, u.created_at, u.updated_at
            FROM updated u
            JOIN products pr ON pr.id = u.product_id
            "#,
        )
        .bind(status.as_str())
        .bind(purchase_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(purchase)
    }
}

#[async_trait]
impl ActivityLogStore for PgBackend {
    async fn insert_activity(&self, entry: NewActivityLog) -> Result<ActivityLog, AppError> {
        let row = sqlx::query_as::<_, ActivityLog>(&format!(
            r#"
            INSERT INTO activity_logs (user_id, category, action, details, hostname, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ACTIVITY_COLUMNS}
            "#
        ))
        .bind(entry.user_id)
        .bind(entry.category.as_str())
        .bind(&entry.action)
        .bind(&entry.details)
        .bind(&entry.hostname)
        .bind(&entry.user_agent)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn list_activity(&self, filter: &ActivityLogFilter) -> Result<Vec<ActivityLog>, AppError> {
        let rows = sqlx::query_as::<_, ActivityLog>(&format!(
            r#"
            SELECT {ACTIVITY_COLUMNS}
            FROM activity_logs
            WHERE ($1::text IS NULL OR category = $1)
              AND ($2::uuid IS NULL OR user_id = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#
        ))
        .bind(filter.category.map(|c| c.as_str()))
        .bind(filter.user_id)
        .bind(clamp_limit(filter.limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
