//! Client-side auth gates and cache reconciliation.
//!
//! These types model what a front end keeps in memory: who is signed in,
//! whether a stored API key is still good, and the admin's purchase list.
//! They talk to the server through small traits so they can run against the
//! HTTP API ([`http::ApiClient`]) or in process against a backend.

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    api_key::KeyValidation,
    purchase::{Purchase, PurchaseFilter, UpdatePurchaseStatus},
    user::Identity,
};

pub mod api_key_gate;
pub mod credential_store;
pub mod http;
pub mod purchase_board;
pub mod session_gate;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Server returned {status}: {message}")]
    Api { status: u16, message: String },

    /// An in-process call failed.
    #[error("{0}")]
    Backend(String),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl From<AppError> for ClientError {
    fn from(err: AppError) -> Self {
        ClientError::Backend(err.to_string())
    }
}

/// Auth-state change notification.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(Identity),
    SignedOut,
    TokenRefreshed(Identity),
}

/// Source of session state.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The identity behind the current session, if any.
    async fn current_session(&self) -> Result<Option<Identity>, ClientError>;

    /// Auth-state change notifications from now on.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;

    async fn sign_out(&self) -> Result<(), ClientError>;
}

/// Checks an API key against the server.
#[async_trait]
pub trait KeyValidator: Send + Sync {
    async fn validate(&self, key: &str) -> Result<KeyValidation, ClientError>;
}

/// Admin purchase operations.
#[async_trait]
pub trait PurchaseApi: Send + Sync {
    async fn list_purchases(&self, filter: &PurchaseFilter) -> Result<Vec<Purchase>, ClientError>;

    async fn update_purchase_status(
        &self,
        purchase_id: Uuid,
        request: &UpdatePurchaseStatus,
    ) -> Result<Purchase, ClientError>;
}
