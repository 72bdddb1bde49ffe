//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers. They
//! are generic over the store traits so the same code runs against
//! PostgreSQL and the in-memory backend.

pub mod activity_logger;
pub mod api_key_service;
pub mod identity_service;
pub mod purchase_service;
