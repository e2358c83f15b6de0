//! Shipping quote handlers.

use axum::{Json, extract::State};
use serde::Deserialize;
use tidewater_core::{CartItem, Destination, PackageSpec};
use tracing::instrument;

use crate::error::Result;
use crate::services::{RateQuote, ShippingQuote};
use crate::state::AppState;

/// Body of `POST /api/shipping/quote`.
///
/// Missing fields deserialize as empty so that validation can name them.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    #[serde(default, alias = "cart")]
    pub items: Vec<CartItem>,
    #[serde(default, alias = "address")]
    pub destination: Destination,
}

/// Body of `POST /api/shipping-rates`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatesRequest {
    #[serde(default, alias = "address")]
    pub destination: Destination,
    #[serde(default)]
    pub packages: Vec<PackageSpec>,
}

/// Quote a cart.
#[instrument(skip(state, request), fields(items = request.items.len()))]
pub async fn quote(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<ShippingQuote>> {
    let quote = state
        .quoter()
        .compute_shipping_quote(&request.items, &request.destination)
        .await?;
    Ok(Json(quote))
}

/// Rate caller-supplied packages.
#[instrument(skip(state, request), fields(packages = request.packages.len()))]
pub async fn rates(
    State(state): State<AppState>,
    Json(request): Json<RatesRequest>,
) -> Result<Json<RateQuote>> {
    let quote = state
        .quoter()
        .rates_for_packages(&request.destination, &request.packages)
        .await?;
    Ok(Json(quote))
}
