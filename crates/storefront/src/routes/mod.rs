//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (shipping origin configured)
//!
//! # Shipping (rate limited)
//! POST /api/shipping/quote     - Quote a cart to a destination
//! POST /api/shipping-rates     - Rate explicit packages (no catalog lookup)
//!
//! # Checkout (rate limited)
//! POST /api/checkout           - Create a hosted payment session
//!
//! # Webhooks
//! POST /api/stripe/webhook     - Stripe event delivery
//! ```

pub mod checkout;
pub mod shipping;
pub mod webhooks;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use crate::middleware::api_rate_limiter;
use crate::state::AppState;

/// Create the shopper-facing API router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/shipping/quote", post(shipping::quote))
        .route("/shipping-rates", post(shipping::rates))
        .route("/checkout", post(checkout::create_session))
        .layer(api_rate_limiter())
}

/// Create the webhook router.
///
/// Stripe retries from a small pool of addresses, so webhooks are not rate
/// limited.
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/stripe/webhook", post(webhooks::stripe))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", api_routes().merge(webhook_routes()))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable until a shipping origin is configured,
/// since every quote would fail without one.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.quoter().has_origin() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
