//! API key model for the key-based auth gate.
//!
//! Keys are long-lived bearer credentials. The raw key string is shown to its
//! owner once at creation and stored as a SHA-256 hash, so lookups hash the
//! presented key first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents an API key record from the database.
///
/// # Database Table
///
/// Maps to the `api_keys` table. Keys are never hard-deleted: revoking sets
/// `is_active = false`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKey {
    pub id: Uuid,

    pub name: String,

    pub description: Option<String>,

    /// SHA-256 hash of the raw key (64 hex characters)
    pub key_hash: String,

    /// First characters of the raw key, kept for display in key listings
    pub key_prefix: String,

    /// Identity that owns this key
    pub user_id: Uuid,

    pub created_at: DateTime<Utc>,

    pub last_used_at: Option<DateTime<Utc>>,

    /// Optional hard expiry. A key past this instant never validates.
    pub expires_at: Option<DateTime<Utc>>,

    /// Whether this API key is currently active
    pub is_active: bool,
}

/// Derived lifecycle state of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyStatus {
    Active,
    Revoked,
    Expired,
}

impl ApiKey {
    /// Status at `now`. Revocation wins over expiry.
    pub fn status_at(&self, now: DateTime<Utc>) -> ApiKeyStatus {
        if !self.is_active {
            ApiKeyStatus::Revoked
        } else if self.expires_at.is_some_and(|expires| expires <= now) {
            ApiKeyStatus::Expired
        } else {
            ApiKeyStatus::Active
        }
    }
}

/// Values needed to insert a new key row.
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub name: String,
    pub description: Option<String>,
    pub key_hash: String,
    pub key_prefix: String,
    pub user_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Result of validating a key: validity, admin privilege and owner.
///
/// `is_admin` is only ever true when `is_valid` is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyValidation {
    pub is_valid: bool,
    pub is_admin: bool,
    pub owner_id: Option<Uuid>,
}

impl KeyValidation {
    pub fn invalid() -> Self {
        Self::default()
    }
}

/// Request body for `POST /api-keys`.
#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Days until expiry; the key never expires when omitted
    #[serde(default)]
    pub expires_in_days: Option<i64>,
}

/// Response body for key endpoints.
///
/// The raw `key` is ONLY included in the creation response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiKeyResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub key_prefix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub status: ApiKeyStatus,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<ApiKey> for ApiKeyResponse {
    fn from(key: ApiKey) -> Self {
        let status = key.status_at(Utc::now());
        Self {
            id: key.id,
            name: key.name,
            description: key.description,
            key_prefix: key.key_prefix,
            key: None,
            status,
            created_at: key.created_at,
            last_used_at: key.last_used_at,
            expires_at: key.expires_at,
        }
    }
}

impl ApiKeyResponse {
    /// Attach the raw key (creation response only).
    pub fn with_key(mut self, key: String) -> Self {
        self.key = Some(key);
        self
    }
}

/// Response body for `POST /api-auth`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiAuthResponse {
    pub success: bool,
    pub user_id: Uuid,
    pub is_admin: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn key(is_active: bool, expires_at: Option<DateTime<Utc>>) -> ApiKey {
        ApiKey {
            id: Uuid::new_v4(),
            name: "ci".into(),
            description: None,
            key_hash: "00".repeat(32),
            key_prefix: "lk_0000".into(),
            user_id: Uuid::new_v4(),
            created_at: Utc::now(),
            last_used_at: None,
            expires_at,
            is_active,
        }
    }

    #[test]
    fn inactive_key_is_revoked_even_if_expired() {
        let past = Utc::now() - Duration::days(1);
        assert_eq!(key(false, Some(past)).status_at(Utc::now()), ApiKeyStatus::Revoked);
    }

    #[test]
    fn expiry_is_enforced() {
        let now = Utc::now();
        assert_eq!(key(true, Some(now)).status_at(now), ApiKeyStatus::Expired);
        assert_eq!(
            key(true, Some(now + Duration::hours(1))).status_at(now),
            ApiKeyStatus::Active
        );
        assert_eq!(key(true, None).status_at(now), ApiKeyStatus::Active);
    }
}
