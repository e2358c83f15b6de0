//! Tidewater Storefront library.
//!
//! Shipping quotes and payment sessions for the storefront checkout, served
//! over a small JSON API. The binary in `main.rs` only loads configuration,
//! sets up Sentry and tracing, and serves [`app`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod sanity;
pub mod services;
pub mod shipengine;
pub mod state;
pub mod stripe;

use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, Method, header},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::{REQUEST_ID_HEADER, request_id_middleware};
use crate::state::AppState;

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = tracing::field::Empty,
        )
    });

    routes::routes()
        .layer(cors_layer(&state))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(trace)
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Allow the storefront's own origin to call the API from the browser.
fn cors_layer(state: &AppState) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::HeaderName::from_static(REQUEST_ID_HEADER)]);

    let origin = state.config().base_url.origin().ascii_serialization();
    match HeaderValue::from_str(&origin) {
        Ok(value) => cors.allow_origin(value),
        Err(e) => {
            tracing::warn!(origin = %origin, error = %e, "Base URL origin is not a valid header");
            cors
        }
    }
}
