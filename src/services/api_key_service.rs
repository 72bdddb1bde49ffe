//! API key validation and lifecycle.
//!
//! Validation splits into two lookups: the key row (is it usable?) and the
//! owner's role (is the owner an administrator?). Only the first decides
//! validity; a failed role lookup downgrades to `is_admin = false`.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::backend::{ApiKeyStore, RoleStore};
use crate::error::AppError;
use crate::models::api_key::{
    ApiKeyResponse, ApiKeyStatus, CreateApiKeyRequest, KeyValidation, NewApiKey,
};
use crate::security;

/// Prefix of every generated key.
pub const KEY_PREFIX: &str = "lk_";

/// Characters of the raw key kept for display (`lk_` + 8 hex).
const DISPLAY_PREFIX_LEN: usize = KEY_PREFIX.len() + 8;

const MAX_NAME_LEN: usize = 100;
const MAX_EXPIRY_DAYS: i64 = 3650;

/// Validate a raw key.
///
/// # Process
///
/// 1. Hash the key and look up the row
/// 2. Reject missing, revoked or expired keys
/// 3. Ask `is_admin(owner)`; failures are logged and count as "not admin"
/// 4. Touch `last_used_at` (best effort)
///
/// Never fails: lookup errors are logged and reported as not valid.
pub async fn validate_api_key<S>(store: &S, key: &str) -> KeyValidation
where
    S: ApiKeyStore + RoleStore + ?Sized,
{
    let key = key.trim();
    if key.is_empty() {
        return KeyValidation::invalid();
    }

    let record = match store.find_api_key_by_hash(&security::hash_token(key)).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            tracing::debug!("API key not found");
            return KeyValidation::invalid();
        }
        Err(e) => {
            tracing::warn!(error = %e, "API key lookup failed");
            return KeyValidation::invalid();
        }
    };

    let status = record.status_at(Utc::now());
    if status != ApiKeyStatus::Active {
        tracing::debug!(key_id = %record.id, ?status, "API key rejected");
        return KeyValidation::invalid();
    }

    let is_admin = match store.is_admin(record.user_id).await {
        Ok(is_admin) => is_admin,
        Err(e) => {
            tracing::warn!(key_id = %record.id, error = %e, "admin check failed, treating owner as non-admin");
            false
        }
    };

    if let Err(e) = store.touch_api_key(record.id).await {
        tracing::warn!(key_id = %record.id, error = %e, "failed to record API key use");
    }

    KeyValidation {
        is_valid: true,
        is_admin,
        owner_id: Some(record.user_id),
    }
}

/// Create a key for `owner_id`.
///
/// The raw key is returned in the response and never again.
pub async fn create_api_key<S>(
    store: &S,
    owner_id: Uuid,
    request: CreateApiKeyRequest,
) -> Result<ApiKeyResponse, AppError>
where
    S: ApiKeyStore + ?Sized,
{
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidRequest("Key name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::InvalidRequest(format!(
            "Key name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }

    let expires_at = match request.expires_in_days {
        Some(days) if !(1..=MAX_EXPIRY_DAYS).contains(&days) => {
            return Err(AppError::InvalidRequest(format!(
                "expires_in_days must be between 1 and {}",
                MAX_EXPIRY_DAYS
            )));
        }
        Some(days) => Some(Utc::now() + Duration::days(days)),
        None => None,
    };

    let raw_key = format!("{}{}", KEY_PREFIX, security::generate_secret());

    let record = store
        .insert_api_key(NewApiKey {
            name: name.to_string(),
            description: request
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            key_hash: security::hash_token(&raw_key),
            key_prefix: raw_key[..DISPLAY_PREFIX_LEN].to_string(),
            user_id: owner_id,
            expires_at,
        })
        .await?;

    tracing::info!(key_id = %record.id, owner = %owner_id, "API key created");

    Ok(ApiKeyResponse::from(record).with_key(raw_key))
}

pub async fn list_api_keys<S>(store: &S, owner_id: Uuid) -> Result<Vec<ApiKeyResponse>, AppError>
where
    S: ApiKeyStore + ?Sized,
{
    let keys = store.list_api_keys(owner_id).await?;
    Ok(keys.into_iter().map(Into::into).collect())
}

/// Revoke (deactivate) a key. Keys are never deleted.
///
/// Returns `NotFound` when the key does not belong to `owner_id`.
pub async fn revoke_api_key<S>(store: &S, owner_id: Uuid, key_id: Uuid) -> Result<(), AppError>
where
    S: ApiKeyStore + ?Sized,
{
    if !store.revoke_api_key(owner_id, key_id).await? {
        return Err(AppError::NotFound("API key"));
    }
    tracing::info!(key_id = %key_id, owner = %owner_id, "API key revoked");
    Ok(())
}
