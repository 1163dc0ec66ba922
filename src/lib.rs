//! Project topic enrollment portal.
//!
//! The crate holds both halves of the system: the shared store service (SQLite persistence,
//! Tantivy title search, REST API) and the portal client that drives a team through the
//! enrollment flow against it.

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod search;
pub mod store;
pub mod validation;
pub mod window;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use store::SharedStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SharedStore>,
    pub config: Arc<Config>,
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.api_psk.clone();

    let api_routes = Router::new()
        // Topics
        .route("/topics", get(api::list_topics).post(api::create_topic))
        .route("/topics/{id}", get(api::get_topic))
        // Claim transaction
        .route("/claims", post(api::claim_topic))
        // Responses
        .route("/responses", get(api::list_responses))
        .route("/responses/query", post(api::query_responses))
        // Stats and window
        .route("/stats", get(api::get_stats))
        .route("/window", get(api::get_window))
        .layer(middleware::from_fn(move |req, next| {
            auth::require_api_key(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
