//! Router configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{campaigns, credits, dispatch, health};
use crate::state::AppState;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Credits
/// - `GET /v1/credits/balance` - Current balance
/// - `GET /v1/credits/ledger` - Ledger history
/// - `POST /v1/credits/add` - Apply a credit grant
///
/// ## Campaigns
/// - `GET /v1/campaigns/{id}/preview` - Recipient count and cost
/// - `POST /v1/campaigns/{id}/schedule` - Charge and schedule sends
///
/// ## Dispatch
/// - `POST /v1/dispatch/run` - Run one dispatcher tick on demand
/// - `GET /v1/dead-letters` - List dead-lettered jobs
pub fn create_router(state: AppState) -> Router {
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);
    let state = Arc::new(state);

    let api_routes = Router::new()
        // Credits
        .route("/credits/balance", get(credits::get_balance))
        .route("/credits/ledger", get(credits::list_ledger))
        .route("/credits/add", post(credits::add_credits))
        // Campaigns
        .route("/campaigns/:id/preview", get(campaigns::preview))
        .route("/campaigns/:id/schedule", post(campaigns::schedule))
        // Dispatch
        .route("/dispatch/run", post(dispatch::run))
        .route("/dead-letters", get(dispatch::list_dead_letters))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", api_routes)
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
