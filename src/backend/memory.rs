//! In-process implementation of the store traits.
//!
//! Used by the test suite and for running the server without PostgreSQL.
//! Failure switches simulate transport errors on individual stores.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    ActivityLogStore, ApiKeyStore, HealthCheck, IdentityStore, PurchaseStore, RoleStore,
    clamp_limit,
};
use crate::error::AppError;
use crate::models::{
    activity_log::{ActivityLog, ActivityLogFilter, NewActivityLog},
    api_key::{ApiKey, NewApiKey},
    purchase::{Purchase, PurchaseFilter, PurchaseStatus},
    user::{MemberStatus, NewIdentity, Profile, SessionRecord, UserCredentials},
};

#[derive(Default)]
struct State {
    credentials: HashMap<Uuid, UserCredentials>,
    profiles: HashMap<Uuid, Profile>,
    admins: HashSet<Uuid>,
    sessions: HashMap<String, SessionRecord>,
    api_keys: Vec<ApiKey>,
    products: HashMap<Uuid, String>,
    purchases: Vec<Purchase>,
    activity: Vec<ActivityLog>,
}

#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    fail_role_lookups: AtomicBool,
    fail_activity_writes: AtomicBool,
    fail_purchase_updates: AtomicBool,
}

fn simulated_outage() -> AppError {
    AppError::Database(sqlx::Error::PoolTimedOut)
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock only means a test panicked mid-write; the data is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make `is_admin` fail until switched back.
    pub fn set_fail_role_lookups(&self, fail: bool) {
        self.fail_role_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_activity_writes(&self, fail: bool) {
        self.fail_activity_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_purchase_updates(&self, fail: bool) {
        self.fail_purchase_updates.store(fail, Ordering::SeqCst);
    }

    /// Grant the admin role directly, without the first-admin check.
    pub fn grant_admin(&self, user_id: Uuid) {
        self.state().admins.insert(user_id);
    }

    /// Seed a product and return its id.
    pub fn insert_product(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state().products.insert(id, name.to_string());
        id
    }

    /// Seed a purchase, as the checkout flow would.
    pub fn insert_purchase(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        status: PurchaseStatus,
    ) -> Purchase {
        let mut state = self.state();
        let now = Utc::now();
        let purchase = Purchase {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            product_name: state.products.get(&product_id).cloned().unwrap_or_default(),
            status: status.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };
        state.purchases.push(purchase.clone());
        purchase
    }

    /// Snapshot of every activity row written so far, oldest first.
    pub fn activity_logs(&self) -> Vec<ActivityLog> {
        self.state().activity.clone()
    }

    pub fn api_keys(&self) -> Vec<ApiKey> {
        self.state().api_keys.clone()
    }
}

#[async_trait]
impl HealthCheck for MemoryBackend {
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for MemoryBackend {
    async fn create_identity(&self, identity: NewIdentity) -> Result<Profile, AppError> {
        let mut state = self.state();
        let taken = state
            .credentials
            .values()
            .any(|c| c.email.eq_ignore_ascii_case(&identity.email));
        if taken {
            return Err(AppError::Conflict("Email is already registered".to_string()));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        state.credentials.insert(
            id,
            UserCredentials {
                id,
                email: identity.email.clone(),
                password_hash: identity.password_hash,
                created_at: now,
            },
        );
        let profile = Profile {
            id,
            email: identity.email,
            display_name: identity.display_name,
            phone: identity.phone,
            level: 1,
            points: 0,
            status: MemberStatus::Standard.as_str().to_string(),
            has_pass: false,
            created_at: now,
            updated_at: now,
        };
        state.profiles.insert(id, profile.clone());

        Ok(profile)
    }

    async fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, AppError> {
        Ok(self
            .state()
            .credentials
            .values()
            .find(|c| c.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>, AppError> {
        Ok(self.state().profiles.get(&user_id).cloned())
    }

    async fn list_profiles(&self, limit: i64) -> Result<Vec<Profile>, AppError> {
        let mut profiles: Vec<Profile> = self.state().profiles.values().cloned().collect();
        profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        profiles.truncate(clamp_limit(Some(limit)) as usize);
        Ok(profiles)
    }

    async fn delete_identity(&self, user_id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state();
        if state.credentials.remove(&user_id).is_none() {
            return Ok(false);
        }
        state.profiles.remove(&user_id);
        state.admins.remove(&user_id);
        state.sessions.retain(|_, s| s.user_id != user_id);
        state.api_keys.retain(|k| k.user_id != user_id);
        state.purchases.retain(|p| p.user_id != user_id);
        Ok(true)
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord, AppError> {
        let session = SessionRecord {
            id: Uuid::new_v4(),
            user_id,
            token_hash: token_hash.to_string(),
            created_at: Utc::now(),
            expires_at,
        };
        self.state()
            .sessions
            .insert(token_hash.to_string(), session.clone());
        Ok(session)
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<SessionRecord>, AppError> {
        let now = Utc::now();
        Ok(self
            .state()
            .sessions
            .get(token_hash)
            .filter(|s| s.expires_at > now)
            .cloned())
    }

    async fn delete_session(&self, token_hash: &str) -> Result<bool, AppError> {
        Ok(self.state().sessions.remove(token_hash).is_some())
    }
}

#[async_trait]
impl RoleStore for MemoryBackend {
    async fn is_admin(&self, user_id: Uuid) -> Result<bool, AppError> {
        if self.fail_role_lookups.load(Ordering::SeqCst) {
            return Err(simulated_outage());
        }
        Ok(self.state().admins.contains(&user_id))
    }

    async fn grant_first_admin(&self, user_id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state();
        if !state.admins.is_empty() {
            return Ok(false);
        }
        state.admins.insert(user_id);
        Ok(true)
    }

    async fn admin_exists(&self) -> Result<bool, AppError> {
        Ok(!self.state().admins.is_empty())
    }
}

#[async_trait]
impl ApiKeyStore for MemoryBackend {
    async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, AppError> {
        Ok(self
            .state()
            .api_keys
            .iter()
            .find(|k| k.key_hash == key_hash)
            .cloned())
    }

    async fn insert_api_key(&self, key: NewApiKey) -> Result<ApiKey, AppError> {
        let mut state = self.state();
        if state.api_keys.iter().any(|k| k.key_hash == key.key_hash) {
            return Err(AppError::Conflict("API key already exists".to_string()));
        }
        let key = ApiKey {
            id: Uuid::new_v4(),
            name: key.name,
            description: key.description,
            key_hash: key.key_hash,
            key_prefix: key.key_prefix,
            user_id: key.user_id,
            created_at: Utc::now(),
            last_used_at: None,
            expires_at: key.expires_at,
            is_active: true,
        };
        state.api_keys.push(key.clone());
        Ok(key)
    }

    async fn list_api_keys(&self, owner_id: Uuid) -> Result<Vec<ApiKey>, AppError> {
        let mut keys: Vec<ApiKey> = self
            .state()
            .api_keys
            .iter()
            .filter(|k| k.user_id == owner_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }

    async fn revoke_api_key(&self, owner_id: Uuid, key_id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state();
        match state
            .api_keys
            .iter_mut()
            .find(|k| k.id == key_id && k.user_id == owner_id)
        {
            Some(key) => {
                key.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn touch_api_key(&self, key_id: Uuid) -> Result<(), AppError> {
        if let Some(key) = self.state().api_keys.iter_mut().find(|k| k.id == key_id) {
            key.last_used_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[async_trait]
impl PurchaseStore for MemoryBackend {
    async fn list_purchases(&self, filter: &PurchaseFilter) -> Result<Vec<Purchase>, AppError> {
        let mut purchases: Vec<Purchase> = self
            .state()
            .purchases
            .iter()
            .filter(|p| filter.status.is_none_or(|s| p.status == s.as_str()))
            .filter(|p| filter.user_id.is_none_or(|u| p.user_id == u))
            .cloned()
            .collect();
        purchases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        purchases.truncate(clamp_limit(filter.limit) as usize);
        Ok(purchases)
    }

    async fn find_purchase(&self, purchase_id: Uuid) -> Result<Option<Purchase>, AppError> {
        Ok(self
            .state()
            .purchases
            .iter()
            .find(|p| p.id == purchase_id)
            .cloned())
    }

    async fn update_purchase_status(
        &self,
        purchase_id: Uuid,
        status: PurchaseStatus,
    ) -> Result<Option<Purchase>, AppError> {
        if self.fail_purchase_updates.load(Ordering::SeqCst) {
            return Err(simulated_outage());
        }
        let mut state = self.state();
        Ok(state
            .purchases
            .iter_mut()
            .find(|p| p.id == purchase_id)
            .map(|purchase| {
                purchase.status = status.as_str().to_string();
                purchase.updated_at = Utc::now();
                purchase.clone()
            }))
    }
}

#[async_trait]
impl ActivityLogStore for MemoryBackend {
    async fn insert_activity(&self, entry: NewActivityLog) -> Result<ActivityLog, AppError> {
        if self.fail_activity_writes.load(Ordering::SeqCst) {
            return Err(simulated_outage());
        }
        let row = ActivityLog {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            category: entry.category.as_str().to_string(),
            action: entry.action,
            details: entry.details,
            hostname: entry.hostname,
            user_agent: entry.user_agent,
            created_at: Utc::now(),
        };
        self.state().activity.push(row.clone());
        Ok(row)
    }

    async fn list_activity(&self, filter: &ActivityLogFilter) -> Result<Vec<ActivityLog>, AppError> {
        let mut rows: Vec<ActivityLog> = self
            .state()
            .activity
            .iter()
            .rev()
            .filter(|r| filter.category.is_none_or(|c| r.category == c.as_str()))
            .filter(|r| filter.user_id.is_none_or(|u| r.user_id == Some(u)))
            .cloned()
            .collect();
        rows.truncate(clamp_limit(filter.limit) as usize);
        Ok(rows)
    }
}
