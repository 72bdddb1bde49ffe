//! Session state for one application root.
//!
//! [`SessionGate::start`] resolves the current session in the background and
//! then follows the provider's auth-state changes until the gate is dropped.
//! Readers either take a [`SessionState`] snapshot or watch for changes.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::{AuthEvent, AuthProvider};
use crate::models::activity_log::{ActivityCategory, NewActivityLog};
use crate::models::user::Identity;
use crate::services::activity_logger::ActivityLogger;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub identity: Option<Identity>,
    /// True until the initial session lookup has finished.
    pub is_loading: bool,
}

impl SessionState {
    fn loading() -> Self {
        Self {
            identity: None,
            is_loading: true,
        }
    }

    fn resolved(identity: Option<Identity>) -> Self {
        Self {
            identity,
            is_loading: false,
        }
    }
}

pub struct SessionGate {
    provider: Arc<dyn AuthProvider>,
    activity: ActivityLogger,
    state: Arc<watch::Sender<SessionState>>,
    listener: JoinHandle<()>,
}

impl SessionGate {
    /// Start tracking the provider's session. Must be called inside a tokio
    /// runtime.
    pub fn start(provider: Arc<dyn AuthProvider>, activity: ActivityLogger) -> Self {
        let (tx, _) = watch::channel(SessionState::loading());
        let state = Arc::new(tx);
        // Subscribe before the lookup so no change in between is missed.
        let events = provider.subscribe();
        let listener = tokio::spawn(follow(
            provider.clone(),
            activity.clone(),
            state.clone(),
            events,
        ));

        Self {
            provider,
            activity,
            state,
            listener,
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub async fn wait_until_ready(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|state| !state.is_loading).await;
    }

    /// Sign out through the provider and clear local state.
    ///
    /// The `auth/signed_out` entry is handed to the sink before the provider
    /// ends the session. Local state is cleared even when the provider call
    /// fails.
    pub async fn sign_out(&self) {
        self.wait_until_ready().await;

        let user_id = self.snapshot().identity.map(|identity| identity.id);
        self.activity
            .log(NewActivityLog::new(user_id, ActivityCategory::Auth, "signed_out"));
        // The sink may need the session being ended to deliver the entry.
        self.activity.flush().await;

        if let Err(e) = self.provider.sign_out().await {
            tracing::warn!(error = %e, "provider sign-out failed, clearing local session anyway");
        }
        self.state.send_replace(SessionState::resolved(None));
    }

    /// Stop following auth-state changes.
    pub fn shutdown(self) {
        self.listener.abort();
    }
}

impl Drop for SessionGate {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn follow(
    provider: Arc<dyn AuthProvider>,
    activity: ActivityLogger,
    state: Arc<watch::Sender<SessionState>>,
    mut events: broadcast::Receiver<AuthEvent>,
) {
    let identity = current_identity(provider.as_ref()).await;
    if let Some(identity) = &identity {
        activity.log(
            NewActivityLog::new(Some(identity.id), ActivityCategory::Auth, "session_restored")
                .with_details(json!({ "email": identity.email })),
        );
    }
    state.send_replace(SessionState::resolved(identity));

    loop {
        let identity = match events.recv().await {
            Ok(AuthEvent::SignedIn(identity)) | Ok(AuthEvent::TokenRefreshed(identity)) => {
                Some(identity)
            }
            Ok(AuthEvent::SignedOut) => None,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "missed auth events, re-reading session");
                current_identity(provider.as_ref()).await
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        state.send_replace(SessionState::resolved(identity));
    }
    tracing::debug!("auth event stream closed");
}

async fn current_identity(provider: &dyn AuthProvider) -> Option<Identity> {
    match provider.current_session().await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(error = %e, "session lookup failed, treating as signed out");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::client::ClientError;
    use crate::services::activity_logger::{ActivitySink, SinkError};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use uuid::Uuid;

    struct FakeProvider {
        session: Mutex<Option<Identity>>,
        fail_lookup: bool,
        fail_sign_out: bool,
        events: broadcast::Sender<AuthEvent>,
    }

    impl FakeProvider {
        fn new(session: Option<Identity>) -> Self {
            Self {
                session: Mutex::new(session),
                fail_lookup: false,
                fail_sign_out: false,
                events: broadcast::channel(16).0,
            }
        }
    }

    #[async_trait]
    impl AuthProvider for FakeProvider {
        async fn current_session(&self) -> Result<Option<Identity>, ClientError> {
            if self.fail_lookup {
                return Err(ClientError::Backend("unreachable".to_string()));
            }
            Ok(self.session.lock().unwrap().clone())
        }

        fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
            self.events.subscribe()
        }

        async fn sign_out(&self) -> Result<(), ClientError> {
            if self.fail_sign_out {
                return Err(ClientError::Backend("unreachable".to_string()));
            }
            *self.session.lock().unwrap() = None;
            let _ = self.events.send(AuthEvent::SignedOut);
            Ok(())
        }
    }

    fn member(email: &str) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: email.to_string(),
            display_name: "Member".to_string(),
            status: "Standard".to_string(),
            points: 0,
            level: 1,
            has_pass: false,
        }
    }

    async fn changed_to(gate: &SessionGate, expected: Option<&Identity>) {
        let mut rx = gate.subscribe();
        tokio::time::timeout(
            Duration::from_secs(1),
            rx.wait_for(|state| state.identity.as_ref() == expected),
        )
        .await
        .expect("state did not change")
        .unwrap();
    }

    #[tokio::test]
    async fn restored_session_is_logged() {
        let backend = Arc::new(MemoryBackend::new());
        let activity = ActivityLogger::for_backend(backend.clone());
        let identity = member("m@club.test");
        let gate = SessionGate::start(
            Arc::new(FakeProvider::new(Some(identity.clone()))),
            activity.clone(),
        );

        gate.wait_until_ready().await;
        activity.flush().await;

        assert_eq!(gate.snapshot(), SessionState::resolved(Some(identity.clone())));
        let rows = backend.activity_logs();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].category, "auth");
        assert_eq!(rows[0].action, "session_restored");
        assert_eq!(rows[0].user_id, Some(identity.id));
    }

    #[tokio::test]
    async fn lookup_failure_means_signed_out() {
        let backend = Arc::new(MemoryBackend::new());
        let activity = ActivityLogger::for_backend(backend.clone());
        let mut provider = FakeProvider::new(Some(member("m@club.test")));
        provider.fail_lookup = true;
        let gate = SessionGate::start(Arc::new(provider), activity.clone());

        gate.wait_until_ready().await;
        activity.flush().await;

        assert_eq!(gate.snapshot(), SessionState::resolved(None));
        assert!(backend.activity_logs().is_empty());
    }

    #[tokio::test]
    async fn follows_auth_events() {
        let backend = Arc::new(MemoryBackend::new());
        let provider = Arc::new(FakeProvider::new(None));
        let gate = SessionGate::start(provider.clone(), ActivityLogger::for_backend(backend));
        gate.wait_until_ready().await;

        let identity = member("new@club.test");
        provider.events.send(AuthEvent::SignedIn(identity.clone())).unwrap();
        changed_to(&gate, Some(&identity)).await;

        let refreshed = Identity {
            points: 50,
            ..identity.clone()
        };
        provider
            .events
            .send(AuthEvent::TokenRefreshed(refreshed.clone()))
            .unwrap();
        changed_to(&gate, Some(&refreshed)).await;

        provider.events.send(AuthEvent::SignedOut).unwrap();
        changed_to(&gate, None).await;
    }

    #[tokio::test]
    async fn sign_out_clears_state_even_when_provider_fails() {
        let backend = Arc::new(MemoryBackend::new());
        let activity = ActivityLogger::for_backend(backend.clone());
        let identity = member("m@club.test");
        let mut provider = FakeProvider::new(Some(identity.clone()));
        provider.fail_sign_out = true;
        let gate = SessionGate::start(Arc::new(provider), activity.clone());

        gate.sign_out().await;
        activity.flush().await;

        assert_eq!(gate.snapshot(), SessionState::resolved(None));
        let actions: Vec<String> = backend
            .activity_logs()
            .into_iter()
            .map(|row| row.action)
            .collect();
        assert_eq!(actions, vec!["session_restored", "signed_out"]);
    }

    /// Records each action with whether the provider still had a session.
    struct SessionAwareSink {
        provider: Arc<FakeProvider>,
        writes: Mutex<Vec<(String, bool)>>,
    }

    #[async_trait]
    impl ActivitySink for SessionAwareSink {
        async fn write(&self, entry: NewActivityLog) -> Result<(), SinkError> {
            let signed_in = self.provider.session.lock().unwrap().is_some();
            self.writes.lock().unwrap().push((entry.action, signed_in));
            Ok(())
        }
    }

    #[tokio::test]
    async fn signed_out_entry_is_written_before_the_session_ends() {
        let provider = Arc::new(FakeProvider::new(Some(member("m@club.test"))));
        let sink = Arc::new(SessionAwareSink {
            provider: provider.clone(),
            writes: Mutex::new(Vec::new()),
        });
        let activity = ActivityLogger::spawn(sink.clone());
        let gate = SessionGate::start(provider.clone(), activity.clone());

        gate.sign_out().await;
        activity.flush().await;

        assert!(provider.session.lock().unwrap().is_none());
        assert_eq!(
            *sink.writes.lock().unwrap(),
            vec![
                ("session_restored".to_string(), true),
                ("signed_out".to_string(), true),
            ]
        );
    }

    #[tokio::test]
    async fn dropping_the_gate_unsubscribes() {
        let backend = Arc::new(MemoryBackend::new());
        let provider = Arc::new(FakeProvider::new(None));
        let gate = SessionGate::start(provider.clone(), ActivityLogger::for_backend(backend));
        gate.wait_until_ready().await;
        assert_eq!(provider.events.receiver_count(), 1);

        gate.shutdown();

        tokio::time::timeout(Duration::from_secs(1), async {
            while provider.events.receiver_count() > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("listener still subscribed");
    }
}
