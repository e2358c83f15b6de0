//! Checkout route handlers.
//!
//! The browser (or `tw-cli`) drives the checkout reducer itself; this
//! endpoint performs the `CREATE_PAYMENT_SESSION` side effect.

use axum::{Json, extract::State};
use tracing::instrument;

use crate::error::{Result, add_breadcrumb};
use crate::services::{CheckoutRequest, CheckoutResponse};
use crate::state::AppState;

/// Create a hosted payment session for the cart.
#[instrument(skip(state, request), fields(items = request.items.len(), carrier = %request.rate.carrier))]
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    add_breadcrumb(
        "checkout",
        "Creating payment session",
        &[
            ("carrier", request.rate.carrier.as_str()),
            ("service", request.rate.service.as_str()),
        ],
    );

    let response = state.checkout().create_session(&request).await?;
    Ok(Json(response))
}
