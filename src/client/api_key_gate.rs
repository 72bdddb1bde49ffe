//! Client-side API key gate.
//!
//! Holds the validation result for the key the user entered and keeps the
//! raw key in a [`CredentialStore`] so it survives restarts. A persisted key
//! is revalidated on [`ApiKeyGate::restore`] and purged if the server no
//! longer accepts it.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use uuid::Uuid;

use super::credential_store::CredentialStore;
use super::{ClientError, KeyValidator};
use crate::backend::Backend;
use crate::models::api_key::KeyValidation;
use crate::services::api_key_service;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyState {
    pub is_authenticated: bool,
    pub is_admin: bool,
    pub owner_id: Option<Uuid>,
    /// True until the first `restore`, `authenticate` or `clear` completes.
    pub is_loading: bool,
}

impl ApiKeyState {
    fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::signed_out()
        }
    }

    fn signed_out() -> Self {
        Self {
            is_authenticated: false,
            is_admin: false,
            owner_id: None,
            is_loading: false,
        }
    }

    fn from_validation(validation: KeyValidation) -> Self {
        if !validation.is_valid {
            return Self::signed_out();
        }
        Self {
            is_authenticated: true,
            is_admin: validation.is_admin,
            owner_id: validation.owner_id,
            is_loading: false,
        }
    }
}

/// Validates keys in process against a backend, without HTTP.
pub struct LocalKeyValidator(pub Arc<dyn Backend>);

#[async_trait]
impl KeyValidator for LocalKeyValidator {
    async fn validate(&self, key: &str) -> Result<KeyValidation, ClientError> {
        Ok(api_key_service::validate_api_key(self.0.as_ref(), key).await)
    }
}

pub struct ApiKeyGate {
    validator: Arc<dyn KeyValidator>,
    storage: Arc<dyn CredentialStore>,
    state: watch::Sender<ApiKeyState>,
}

impl ApiKeyGate {
    pub fn new(validator: Arc<dyn KeyValidator>, storage: Arc<dyn CredentialStore>) -> Self {
        let (state, _) = watch::channel(ApiKeyState::loading());
        Self {
            validator,
            storage,
            state,
        }
    }

    pub fn state(&self) -> ApiKeyState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ApiKeyState> {
        self.state.subscribe()
    }

    /// Validate `key` and remember it if the server accepts it.
    ///
    /// Never fails: transport errors count as an invalid key. On rejection
    /// any previously stored key is removed too.
    pub async fn authenticate(&self, key: &str) -> bool {
        let validation = self.check(key).await;

        if validation.is_valid {
            if let Err(e) = self.storage.save(key.trim()) {
                tracing::warn!(error = %e, "failed to persist API key");
            }
        } else {
            self.forget();
        }

        self.state.send_replace(ApiKeyState::from_validation(validation));
        validation.is_valid
    }

    /// Revalidate the persisted key, if any, without user interaction.
    pub async fn restore(&self) -> ApiKeyState {
        let stored = match self.storage.load() {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read stored API key");
                None
            }
        };

        let next = match stored {
            None => ApiKeyState::signed_out(),
            Some(key) => {
                let validation = self.check(&key).await;
                if !validation.is_valid {
                    tracing::info!("stored API key is no longer valid, removing it");
                    self.forget();
                }
                ApiKeyState::from_validation(validation)
            }
        };

        self.state.send_replace(next.clone());
        next
    }

    /// Drop the stored key and sign out.
    pub fn clear(&self) {
        self.forget();
        self.state.send_replace(ApiKeyState::signed_out());
    }

    async fn check(&self, key: &str) -> KeyValidation {
        let key = key.trim();
        if key.is_empty() {
            return KeyValidation::invalid();
        }
        match self.validator.validate(key).await {
            Ok(validation) => validation,
            Err(e) => {
                tracing::warn!(error = %e, "API key validation request failed");
                KeyValidation::invalid()
            }
        }
    }

    fn forget(&self) {
        if let Err(e) = self.storage.clear() {
            tracing::warn!(error = %e, "failed to clear stored API key");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{IdentityStore, MemoryBackend};
    use crate::client::credential_store::{FileCredentialStore, MemoryCredentialStore};
    use crate::models::api_key::CreateApiKeyRequest;
    use crate::models::user::NewIdentity;

    async fn admin_key(backend: &MemoryBackend) -> (Uuid, String, Uuid) {
        let owner = backend
            .create_identity(NewIdentity {
                email: "admin@club.test".to_string(),
                password_hash: "x".to_string(),
                display_name: "Admin".to_string(),
                phone: None,
            })
            .await
            .unwrap()
            .id;
        backend.grant_admin(owner);
        let created = api_key_service::create_api_key(
            backend,
            owner,
            CreateApiKeyRequest {
                name: "console".to_string(),
                description: None,
                expires_in_days: None,
            },
        )
        .await
        .unwrap();
        (owner, created.key.unwrap(), created.id)
    }

    struct Unreachable;

    #[async_trait]
    impl KeyValidator for Unreachable {
        async fn validate(&self, _key: &str) -> Result<KeyValidation, ClientError> {
            Err(ClientError::Backend("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn valid_key_is_remembered() {
        let backend = Arc::new(MemoryBackend::new());
        let (owner, key, _) = admin_key(&backend).await;
        let storage = Arc::new(MemoryCredentialStore::new());
        let gate = ApiKeyGate::new(Arc::new(LocalKeyValidator(backend.clone())), storage.clone());

        assert!(gate.state().is_loading);
        assert!(gate.authenticate(&key).await);

        let state = gate.state();
        assert!(state.is_authenticated);
        assert!(state.is_admin);
        assert_eq!(state.owner_id, Some(owner));
        assert_eq!(storage.load().unwrap(), Some(key));
    }

    #[tokio::test]
    async fn rejected_key_clears_storage() {
        let backend = Arc::new(MemoryBackend::new());
        let storage = Arc::new(MemoryCredentialStore::new());
        storage.save("lk_previous").unwrap();
        let gate = ApiKeyGate::new(Arc::new(LocalKeyValidator(backend)), storage.clone());

        assert!(!gate.authenticate("dead000").await);
        assert_eq!(gate.state(), ApiKeyState::signed_out());
        assert_eq!(storage.load().unwrap(), None);
    }

    #[tokio::test]
    async fn transport_error_counts_as_invalid() {
        let storage = Arc::new(MemoryCredentialStore::new());
        let gate = ApiKeyGate::new(Arc::new(Unreachable), storage);

        assert!(!gate.authenticate("lk_anything").await);
        assert!(!gate.state().is_authenticated);
    }

    #[tokio::test]
    async fn restore_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let backend = Arc::new(MemoryBackend::new());
        let (_, key, _) = admin_key(&backend).await;

        let first = ApiKeyGate::new(
            Arc::new(LocalKeyValidator(backend.clone())),
            Arc::new(FileCredentialStore::new(&path)),
        );
        assert!(first.authenticate(&key).await);
        drop(first);

        let second = ApiKeyGate::new(
            Arc::new(LocalKeyValidator(backend.clone())),
            Arc::new(FileCredentialStore::new(&path)),
        );
        let restored = second.restore().await;
        assert!(restored.is_authenticated);
        assert!(restored.is_admin);
        assert!(!restored.is_loading);
    }

    #[tokio::test]
    async fn revoked_key_is_purged_on_restore() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let backend = Arc::new(MemoryBackend::new());
        let (owner, key, key_id) = admin_key(&backend).await;
        let storage = Arc::new(FileCredentialStore::new(&path));
        storage.save(&key).unwrap();

        api_key_service::revoke_api_key(backend.as_ref(), owner, key_id)
            .await
            .unwrap();

        let gate = ApiKeyGate::new(Arc::new(LocalKeyValidator(backend)), storage.clone());
        let restored = gate.restore().await;

        assert!(!restored.is_authenticated);
        assert_eq!(storage.load().unwrap(), None);
    }

    #[tokio::test]
    async fn restore_without_stored_key_finishes_loading() {
        let gate = ApiKeyGate::new(
            Arc::new(Unreachable),
            Arc::new(MemoryCredentialStore::new()),
        );
        let mut rx = gate.subscribe();

        gate.restore().await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), ApiKeyState::signed_out());
    }

    #[tokio::test]
    async fn clear_signs_out() {
        let backend = Arc::new(MemoryBackend::new());
        let (_, key, _) = admin_key(&backend).await;
        let storage = Arc::new(MemoryCredentialStore::new());
        let gate = ApiKeyGate::new(Arc::new(LocalKeyValidator(backend)), storage.clone());
        gate.authenticate(&key).await;

        gate.clear();

        assert_eq!(gate.state(), ApiKeyState::signed_out());
        assert_eq!(storage.load().unwrap(), None);
    }
}
