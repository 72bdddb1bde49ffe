//! Data models representing database entities and API payloads.

/// Activity log (append-only audit trail)
pub mod activity_log;
/// API key model for the key-based auth gate
pub mod api_key;
/// Purchases and their fulfillment status
pub mod purchase;
/// Identities, profiles and sessions
pub mod user;
