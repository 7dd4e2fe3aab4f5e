//! API module
//!
//! HTTP API endpoints and middleware.

pub mod extract;
pub mod middleware;
pub mod routes;

use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::ledger::LedgerStore;

pub use routes::{create_router, AppState};

/// Build the application router
pub fn build_router<S: LedgerStore>(state: AppState<S>) -> Router {
    // Layers run last-added first: auth context -> logging -> handler
    let api_routes = create_router::<S>()
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::auth_context_middleware));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
