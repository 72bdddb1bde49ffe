//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, headers)
//! 2. Calls into `services` or the backend
//! 3. Returns a JSON response or an error

pub mod activity;
pub mod admin;
pub mod api_auth;
pub mod api_keys;
pub mod auth;
pub mod health;
pub mod purchases;
