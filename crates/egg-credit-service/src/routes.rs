//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{balance, health, root, token_used};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent requests for the usage endpoint.
const USAGE_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for balance endpoints.
const BALANCE_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /` - Service banner
/// - `GET /health` - Health check
///
/// ## Usage (Service API Key auth)
/// - `POST /api/v1/token_used` - Debit a usage
///
/// ## Balances (Service API Key auth)
/// - `GET /api/v1/balance/:user_id` - Current balance document
/// - `POST /api/v1/balance/:user_id/recompute` - Recompute from history
/// - `GET /api/v1/balance/:user_id/topup-total` - Topup purchase total
pub fn create_router(state: AppState) -> Router {
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let usage_routes = Router::new()
        .route("/token_used", post(token_used::record_token_used))
        .layer(ConcurrencyLimitLayer::new(USAGE_MAX_CONCURRENT_REQUESTS));

    let balance_routes = Router::new()
        .route("/:user_id", get(balance::get_balance))
        .route("/:user_id/recompute", post(balance::recompute_balance))
        .route("/:user_id/topup-total", get(balance::topup_total))
        .layer(ConcurrencyLimitLayer::new(BALANCE_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        .merge(usage_routes)
        .nest("/balance", balance_routes);

    Router::new()
        .route("/", get(root::root))
        .route("/health", get(health::health))
        .nest("/api/v1", api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
