//! API route handlers.

pub mod auth;

use crate::auth::AppState;
use crate::middleware::no_store;
use axum::{routing::get, routing::post, Router};
use tower_http::trace::TraceLayer;

/// Build the API router with all endpoints.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        // Account endpoints
        .route("/api/users", post(auth::signup))
        .route("/api/users/login", post(auth::login))
        .route("/api/users/me", get(auth::me))
        // Session endpoints
        .route("/api/users/refresh", post(auth::refresh))
        .route("/api/users/logout", post(auth::logout))
        .route("/api/users/logout-all", post(auth::logout_all))
        .route("/api/users/sessions", get(auth::list_sessions))
}

/// The full application: routes, request tracing and cache headers.
pub fn app(state: AppState) -> Router {
    api_router()
        .layer(axum::middleware::from_fn(no_store))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
