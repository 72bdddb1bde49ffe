//! HTTP middleware and request extractors.

/// Session and admin authentication
pub mod auth;
/// Host / user-agent metadata for activity entries
pub mod request_meta;
