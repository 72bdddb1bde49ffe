//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `BOOTSTRAP_TOKEN` (optional): one-time setup token for `POST /create-admin`.
///   When unset the endpoint is disabled.
/// - `SESSION_TTL_HOURS` (optional): lifetime of session tokens, defaults to 168 (one week)
/// - `CORS_ALLOW_ORIGIN` (optional): single allowed origin; any origin when unset
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default)]
    pub bootstrap_token: Option<String>,

    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,

    #[serde(default)]
    pub cors_allow_origin: Option<String>,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_session_ttl_hours() -> i64 {
    24 * 7
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        envy::from_env::<Config>()
    }

    /// Configuration for tests and embedded use, no environment involved.
    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            server_port: default_port(),
            bootstrap_token: None,
            session_ttl_hours: default_session_ttl_hours(),
            cors_allow_origin: None,
        }
    }

    /// Returns the bootstrap token if one is configured and non-empty.
    pub fn bootstrap_token(&self) -> Option<&str> {
        self.bootstrap_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}
