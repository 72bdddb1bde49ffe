//! Loyalty Club Server - Main Application Entry Point
//!
//! REST API for the loyalty club: member sessions, API-key access for
//! administrative tooling, purchase fulfillment and the activity log.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: session tokens and API keys, both stored as SHA-256 hashes
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Start the activity logger and build the router
//! 5. Serve until Ctrl-C, then flush pending activity entries

use std::sync::Arc;

use loyalty_club_server::{AppState, backend::PgBackend, config, db, router};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG (defaults to "info")
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");
    if config.bootstrap_token().is_none() {
        tracing::info!("BOOTSTRAP_TOKEN not set, /create-admin is disabled");
    }

    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let addr = format!("0.0.0.0:{}", config.server_port);
    let state = AppState::new(Arc::new(PgBackend::new(pool)), config);
    let activity = state.activity.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await?;

    activity.flush().await;
    tracing::info!("Server stopped");

    Ok(())
}
