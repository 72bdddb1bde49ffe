//! Loyalty club backend.
//!
//! An HTTP API for a club-membership program: members hold points, rewards
//! and club passes; administrators manage purchases, users and keys. The
//! `client` module carries the client-side auth gates that sit in front of
//! this API.

pub mod backend;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod security;
pub mod services;
pub mod state;

pub use routes::router;
pub use state::AppState;
