//! Shared helpers for the HTTP integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header, request::Builder as RequestBuilder},
};
use loyalty_club_server::{
    AppState,
    backend::MemoryBackend,
    config::Config,
    models::{
        api_key::CreateApiKeyRequest,
        user::{SignInRequest, SignUpRequest},
    },
    router,
    services::{api_key_service, identity_service},
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const SETUP_TOKEN: &str = "setup-secret-for-tests";
pub const PASSWORD: &str = "club-password";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub backend: Arc<MemoryBackend>,
}

pub fn test_config() -> Config {
    let mut config = Config::for_database("postgres://localhost/loyalty_club_test");
    config.bootstrap_token = Some(SETUP_TOKEN.to_string());
    config
}

pub fn test_app() -> TestApp {
    let backend = Arc::new(MemoryBackend::new());
    let state = AppState::new(backend.clone(), test_config());
    TestApp {
        app: router(state.clone()),
        state,
        backend,
    }
}

impl TestApp {
    /// Send a request and return the status with the JSON body (Null if empty).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    /// Register a member and return `(user_id, session token)`.
    pub async fn member(&self, email: &str) -> (Uuid, String) {
        let profile = identity_service::sign_up(
            self.backend.as_ref(),
            SignUpRequest {
                email: email.to_string(),
                password: PASSWORD.to_string(),
                display_name: "Member".to_string(),
                phone: None,
            },
        )
        .await
        .unwrap();
        let session = identity_service::sign_in(
            self.backend.as_ref(),
            self.state.session_ttl(),
            SignInRequest {
                email: email.to_string(),
                password: PASSWORD.to_string(),
            },
        )
        .await
        .unwrap();
        (profile.id, session.access_token)
    }

    pub async fn admin(&self, email: &str) -> (Uuid, String) {
        let (id, token) = self.member(email).await;
        self.backend.grant_admin(id);
        (id, token)
    }

    /// Create an API key for `owner` and return the raw key.
    pub async fn api_key(&self, owner: Uuid) -> String {
        api_key_service::create_api_key(
            self.backend.as_ref(),
            owner,
            CreateApiKeyRequest {
                name: "tests".to_string(),
                description: None,
                expires_in_days: None,
            },
        )
        .await
        .unwrap()
        .key
        .unwrap()
    }
}

pub fn request(method: &str, uri: &str) -> RequestBuilder {
    Request::builder().method(method).uri(uri)
}

pub fn json(builder: RequestBuilder, body: Value) -> Request<Body> {
    builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty(builder: RequestBuilder) -> Request<Body> {
    builder.body(Body::empty()).unwrap()
}

pub fn bearer(builder: RequestBuilder, token: &str) -> RequestBuilder {
    builder.header(header::AUTHORIZATION, format!("Bearer {}", token))
}
