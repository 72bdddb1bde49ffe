//! PostgreSQL pool and migrations.
//!
//! The schema (users, profiles, roles, sessions, api keys, purchases and the
//! append-only activity log) lives in `migrations/` and is applied at startup.

use sqlx::{Pool, Postgres};

/// Shared PostgreSQL connection pool.
pub type DbPool = Pool<Postgres>;

/// Create the connection pool used by [`crate::backend::PgBackend`].
///
/// Connections are opened lazily up to a maximum of 5.
///
/// # Errors
///
/// Returns an error if the connection string is invalid or the server
/// cannot be reached.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
}

/// Apply pending migrations from `migrations/`.
///
/// Applied migrations are tracked in `_sqlx_migrations`, so each file runs once.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
