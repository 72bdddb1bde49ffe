//! HTTP implementation of the client traits.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use tokio::sync::{RwLock, broadcast};
use url::Url;
use uuid::Uuid;

use super::{AuthEvent, AuthProvider, ClientError, KeyValidator, PurchaseApi};
use crate::middleware::auth::API_KEY_HEADER;
use crate::models::{
    activity_log::{ClientActivityRequest, NewActivityLog},
    api_key::{ApiAuthResponse, KeyValidation},
    purchase::{Purchase, PurchaseFilter, UpdatePurchaseStatus},
    user::{CurrentSessionResponse, Identity, SessionResponse, SignInRequest},
};
use crate::services::activity_logger::{ActivitySink, SinkError};

const EVENT_BUFFER: usize = 16;

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Talks to the loyalty club server.
///
/// Holds the session token after [`ApiClient::sign_in`] and, optionally, an
/// API key. Admin calls send the API key when one is set and the session
/// token otherwise.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
    token: RwLock<Option<String>>,
    events: broadcast::Sender<AuthEvent>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("loyalty-club-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_key: None,
            token: RwLock::new(None),
            events: broadcast::channel(EVENT_BUFFER).0,
        })
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path)?)
    }

    async fn bearer(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    async fn with_bearer(&self, request: RequestBuilder) -> RequestBuilder {
        match self.bearer().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn with_admin_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => self.with_bearer(request).await,
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, ClientError> {
        let response = self
            .http
            .post(self.endpoint("auth/sign-in")?)
            .json(&SignInRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        let session: SessionResponse = json(response).await?;

        *self.token.write().await = Some(session.access_token);
        let _ = self.events.send(AuthEvent::SignedIn(session.user.clone()));
        Ok(session.user)
    }

    /// Rotate the session token.
    pub async fn refresh(&self) -> Result<Identity, ClientError> {
        let request = self.http.post(self.endpoint("auth/refresh")?);
        let response = self.with_bearer(request).await.send().await?;
        let session: SessionResponse = json(response).await?;

        *self.token.write().await = Some(session.access_token);
        let _ = self
            .events
            .send(AuthEvent::TokenRefreshed(session.user.clone()));
        Ok(session.user)
    }
}

#[async_trait]
impl AuthProvider for ApiClient {
    async fn current_session(&self) -> Result<Option<Identity>, ClientError> {
        let Some(token) = self.bearer().await else {
            return Ok(None);
        };

        let response = self
            .http
            .get(self.endpoint("auth/session")?)
            .bearer_auth(token)
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            *self.token.write().await = None;
            return Ok(None);
        }

        let body: CurrentSessionResponse = json(response).await?;
        Ok(Some(body.user))
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// The local token is dropped even when the server call fails.
    async fn sign_out(&self) -> Result<(), ClientError> {
        let Some(token) = self.token.write().await.take() else {
            return Ok(());
        };
        let _ = self.events.send(AuthEvent::SignedOut);

        let response = self
            .http
            .post(self.endpoint("auth/sign-out")?)
            .bearer_auth(token)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValidator for ApiClient {
    async fn validate(&self, key: &str) -> Result<KeyValidation, ClientError> {
        let response = self
            .http
            .post(self.endpoint("api-auth")?)
            .header(API_KEY_HEADER, key)
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(KeyValidation::invalid());
        }

        let body: ApiAuthResponse = json(response).await?;
        Ok(KeyValidation {
            is_valid: body.success,
            is_admin: body.success && body.is_admin,
            owner_id: body.success.then_some(body.user_id),
        })
    }
}

#[async_trait]
impl PurchaseApi for ApiClient {
    async fn list_purchases(&self, filter: &PurchaseFilter) -> Result<Vec<Purchase>, ClientError> {
        let request = self.http.get(self.endpoint("admin/purchases")?).query(filter);
        let response = self.with_admin_auth(request).await.send().await?;
        json(response).await
    }

    async fn update_purchase_status(
        &self,
        purchase_id: Uuid,
        request: &UpdatePurchaseStatus,
    ) -> Result<Purchase, ClientError> {
        let url = self.endpoint(&format!("admin/purchases/{}/status", purchase_id))?;
        let builder = self.http.patch(url).json(request);
        let response = self.with_admin_auth(builder).await.send().await?;
        json(response).await
    }
}

/// Forwards client-side entries to `POST /activity-logs`.
///
/// The server stamps the user, host and user agent; entries written while
/// signed out are rejected.
#[async_trait]
impl ActivitySink for ApiClient {
    async fn write(&self, entry: NewActivityLog) -> Result<(), SinkError> {
        let request = self
            .http
            .post(self.endpoint("activity-logs")?)
            .json(&ClientActivityRequest {
                category: entry.category,
                action: entry.action,
                details: entry.details,
            });
        let response = self.with_bearer(request).await.send().await?;
        check(response).await?;
        Ok(())
    }
}

async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    Ok(check(response).await?.json().await?)
}
