//! Identity, profile and session models.
//!
//! Identities own credentials (email + argon2 password hash). Profile fields
//! shown to members (points, level, club status, pass) live in `profiles`,
//! keyed by the identity id.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Club membership tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberStatus {
    Standard,
    Premium,
    #[serde(rename = "VIP")]
    Vip,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Standard => "Standard",
            MemberStatus::Premium => "Premium",
            MemberStatus::Vip => "VIP",
        }
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Standard" => Ok(MemberStatus::Standard),
            "Premium" => Ok(MemberStatus::Premium),
            "VIP" => Ok(MemberStatus::Vip),
            other => Err(format!("Unknown member status: {}", other)),
        }
    }
}

/// Credential row from `users`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserCredentials {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Member profile from `profiles`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub phone: Option<String>,
    pub level: i32,
    pub points: i64,
    /// "Standard", "Premium" or "VIP"
    pub status: String,
    pub has_pass: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The authenticated identity as seen by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub status: String,
    pub points: i64,
    pub level: i32,
    pub has_pass: bool,
}

impl From<Profile> for Identity {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id,
            email: profile.email,
            display_name: profile.display_name,
            status: profile.status,
            points: profile.points,
            level: profile.level,
            has_pass: profile.has_pass,
        }
    }
}

/// New identity to insert (credentials + initial profile).
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub phone: Option<String>,
}

/// Session row from `sessions`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Request body for `POST /auth/sign-up`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Request body for `POST /auth/sign-in`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Returned by sign-in and refresh.
///
/// `access_token` is only ever shown here; the server keeps a hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResponse {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: Identity,
}

/// Returned by `GET /auth/session`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CurrentSessionResponse {
    pub user: Identity,
}

/// Request body for `POST /create-admin`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateAdminRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Request body for `POST /delete-user`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteUserRequest {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vip_uses_upper_case_wire_name() {
        assert_eq!(serde_json::to_string(&MemberStatus::Vip).unwrap(), r#""VIP""#);
        assert_eq!("VIP".parse::<MemberStatus>().unwrap(), MemberStatus::Vip);
    }

    #[test]
    fn delete_user_body_uses_camel_case_id() {
        let id = Uuid::new_v4();
        let body = format!(r#"{{"userId":"{}"}}"#, id);
        let req: DeleteUserRequest = serde_json::from_str(&body).unwrap();
        assert_eq!(req.user_id, id);
    }
}
