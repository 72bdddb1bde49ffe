//! Router assembly.

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, patch, post},
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers,
    middleware::auth::{API_KEY_HEADER, require_admin, require_session},
    state::AppState,
};

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    // Signed-in members
    let session_routes = Router::new()
        .route("/me", get(handlers::auth::me))
        .route("/activity-logs", post(handlers::activity::record_activity))
        .route(
            "/api-keys",
            post(handlers::api_keys::create_api_key).get(handlers::api_keys::list_api_keys),
        )
        .route(
            "/api-keys/{id}/revoke",
            post(handlers::api_keys::revoke_api_key),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    // Administrators, by session or API key
    let admin_routes = Router::new()
        .route("/admin/users", get(handlers::admin::list_users))
        .route("/admin/purchases", get(handlers::purchases::list_purchases))
        .route(
            "/admin/purchases/{id}/status",
            patch(handlers::purchases::update_purchase_status),
        )
        .route(
            "/admin/activity-logs",
            get(handlers::activity::list_activity),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_admin,
        ));

    let cors = cors_layer(state.config.cors_allow_origin.as_deref());

    Router::new()
        // Public routes (each does its own credential check where needed)
        .route("/health", get(handlers::health::health_check))
        .route("/api-auth", post(handlers::api_auth::authenticate))
        .route("/create-admin", post(handlers::admin::create_admin))
        .route("/delete-user", post(handlers::admin::delete_user))
        .route("/auth/sign-up", post(handlers::auth::sign_up))
        .route("/auth/sign-in", post(handlers::auth::sign_in))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/sign-out", post(handlers::auth::sign_out))
        .route("/auth/session", get(handlers::auth::current_session))
        .merge(session_routes)
        .merge(admin_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allow_origin: Option<&str>) -> CorsLayer {
    let origin = match allow_origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => AllowOrigin::exact(origin),
        Some(Err(_)) => {
            tracing::warn!("CORS_ALLOW_ORIGIN is not a valid header value, allowing any origin");
            AllowOrigin::from(Any)
        }
        None => AllowOrigin::from(Any),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(API_KEY_HEADER),
            HeaderName::from_static(handlers::admin::SETUP_TOKEN_HEADER),
            HeaderName::from_static("x-client-info"),
        ])
}
