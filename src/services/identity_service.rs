//! Identity provider: sign-up, sessions, admin bootstrap and user deletion.
//!
//! Session tokens are random 32-byte secrets handed to the client once and
//! stored as SHA-256 hashes, the same way API keys are.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::backend::{IdentityStore, RoleStore};
use crate::error::AppError;
use crate::models::user::{
    CreateAdminRequest, Identity, NewIdentity, Profile, SessionResponse, SignInRequest,
    SignUpRequest,
};
use crate::security;

const MIN_PASSWORD_LEN: usize = 8;

/// Outcome of a successful bootstrap, used for the `{message}` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Created(Uuid),
    Promoted(Uuid),
}

impl BootstrapOutcome {
    pub fn user_id(&self) -> Uuid {
        match self {
            BootstrapOutcome::Created(id) | BootstrapOutcome::Promoted(id) => *id,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            BootstrapOutcome::Created(_) => "Admin user created successfully",
            BootstrapOutcome::Promoted(_) => "Existing user promoted to admin",
        }
    }
}

fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::InvalidRequest("A valid email is required".to_string())),
    }
}

fn check_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Register a new member with a Standard profile.
pub async fn sign_up<S>(store: &S, request: SignUpRequest) -> Result<Profile, AppError>
where
    S: IdentityStore + ?Sized,
{
    let email = normalize_email(&request.email)?;
    check_password(&request.password)?;
    let display_name = request.display_name.trim();
    if display_name.is_empty() {
        return Err(AppError::InvalidRequest("Display name is required".to_string()));
    }

    let profile = store
        .create_identity(NewIdentity {
            email,
            password_hash: security::hash_password(&request.password)?,
            display_name: display_name.to_string(),
            phone: request
                .phone
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
        })
        .await?;

    tracing::info!(user_id = %profile.id, "identity created");
    Ok(profile)
}

/// Check credentials and open a session.
///
/// Unknown email and wrong password produce the same error.
pub async fn sign_in<S>(
    store: &S,
    session_ttl: Duration,
    request: SignInRequest,
) -> Result<SessionResponse, AppError>
where
    S: IdentityStore + ?Sized,
{
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let credentials = store
        .find_credentials_by_email(request.email.trim())
        .await?
        .ok_or_else(invalid)?;

    if !security::verify_password(&credentials.password_hash, &request.password) {
        return Err(invalid());
    }

    issue_session(store, credentials.id, session_ttl).await
}

/// Open a new session for `user_id`.
pub async fn issue_session<S>(
    store: &S,
    user_id: Uuid,
    session_ttl: Duration,
) -> Result<SessionResponse, AppError>
where
    S: IdentityStore + ?Sized,
{
    let profile = store
        .find_profile(user_id)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    let token = security::generate_secret();
    let session = store
        .create_session(user_id, &security::hash_token(&token), Utc::now() + session_ttl)
        .await?;

    Ok(SessionResponse {
        access_token: token,
        expires_at: session.expires_at,
        user: profile.into(),
    })
}

/// Resolve a bearer token to its identity.
pub async fn resolve_session<S>(store: &S, token: &str) -> Result<Identity, AppError>
where
    S: IdentityStore + ?Sized,
{
    let session = store
        .find_session(&security::hash_token(token))
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired session".to_string()))?;

    let profile = store
        .find_profile(session.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired session".to_string()))?;

    Ok(profile.into())
}

/// Exchange a live token for a fresh one. The old token stops working.
pub async fn refresh_session<S>(
    store: &S,
    token: &str,
    session_ttl: Duration,
) -> Result<SessionResponse, AppError>
where
    S: IdentityStore + ?Sized,
{
    let identity = resolve_session(store, token).await?;
    store.delete_session(&security::hash_token(token)).await?;
    issue_session(store, identity.id, session_ttl).await
}

pub async fn sign_out<S>(store: &S, token: &str) -> Result<(), AppError>
where
    S: IdentityStore + ?Sized,
{
    if !store.delete_session(&security::hash_token(token)).await? {
        return Err(AppError::Unauthorized("Invalid or expired session".to_string()));
    }
    Ok(())
}

/// Provision the first administrator.
///
/// Requires the configured setup token. Once any administrator exists this
/// always fails, so the token is effectively single-use. An existing identity
/// with the given email is promoted if the password matches. Of concurrent
/// callers at most one is granted the role; an identity created for a losing
/// call is removed again.
pub async fn bootstrap_admin<S>(
    store: &S,
    configured_token: Option<&str>,
    presented_token: Option<&str>,
    request: CreateAdminRequest,
) -> Result<BootstrapOutcome, AppError>
where
    S: IdentityStore + RoleStore + ?Sized,
{
    let expected = configured_token
        .ok_or_else(|| AppError::InvalidRequest("Admin bootstrap is disabled".to_string()))?;
    let presented =
        presented_token.ok_or_else(|| AppError::Unauthorized("Missing setup token".to_string()))?;
    if !security::secrets_match(expected, presented) {
        return Err(AppError::Unauthorized("Invalid setup token".to_string()));
    }

    if store.admin_exists().await? {
        return Err(AppError::Conflict(
            "An administrator already exists".to_string(),
        ));
    }

    let email = normalize_email(&request.email)?;
    let outcome = match store.find_credentials_by_email(&email).await? {
        Some(existing) => {
            if !security::verify_password(&existing.password_hash, &request.password) {
                return Err(AppError::Unauthorized(
                    "Invalid email or password".to_string(),
                ));
            }
            BootstrapOutcome::Promoted(existing.id)
        }
        None => {
            let display_name = request
                .display_name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "Administrator".to_string());
            let profile = sign_up(
                store,
                SignUpRequest {
                    email,
                    password: request.password,
                    display_name,
                    phone: None,
                },
            )
            .await?;
            BootstrapOutcome::Created(profile.id)
        }
    };

    // A concurrent bootstrap may have won since the check above.
    if !store.grant_first_admin(outcome.user_id()).await? {
        if let BootstrapOutcome::Created(user_id) = outcome {
            if let Err(e) = store.delete_identity(user_id).await {
                tracing::warn!(%user_id, error = %e, "failed to remove identity after losing bootstrap");
            }
        }
        return Err(AppError::Conflict(
            "An administrator already exists".to_string(),
        ));
    }
    tracing::info!(user_id = %outcome.user_id(), "administrator provisioned");

    Ok(outcome)
}

/// Delete `target` on behalf of the holder of `caller_token`.
///
/// # Checks
///
/// 1. The caller's session is valid
/// 2. `is_admin(caller)` holds
/// 3. The caller is not deleting themselves
///
/// Returns the caller's id for auditing.
pub async fn delete_user<S>(store: &S, caller_token: &str, target: Uuid) -> Result<Uuid, AppError>
where
    S: IdentityStore + RoleStore + ?Sized,
{
    let caller = resolve_session(store, caller_token).await?;

    if !store.is_admin(caller.id).await? {
        return Err(AppError::Forbidden);
    }

    if caller.id == target {
        return Err(AppError::InvalidRequest(
            "Administrators cannot delete their own account".to_string(),
        ));
    }

    if !store.delete_identity(target).await? {
        return Err(AppError::NotFound("User"));
    }

    tracing::info!(admin = %caller.id, user_id = %target, "user deleted");
    Ok(caller.id)
}
