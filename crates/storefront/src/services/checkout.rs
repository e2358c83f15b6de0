//! Payment session creation.
//!
//! The browser sends cart lines, the shipping address and the rate the
//! shopper picked. Nothing priced by the browser is trusted: line prices come
//! from the catalog, and the cart is re-quoted so the shipping charge is the
//! provider's current amount for the chosen carrier service.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tidewater_core::{
    AddressError, CartItem, CartTooLarge, CurrencyCode, Destination, DocumentId, PricedLine,
    PricingError, ShippingRate, cart_units, price_cart,
};
use tracing::instrument;

use super::quote::{QuoteError, ShippingQuoter};
use super::{Catalog, CheckoutLine, CheckoutSessionRequest, PaymentGateway};
use crate::sanity::SanityError;
use crate::stripe::StripeError;

/// Errors from creating a payment session.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("{0}")]
    InvalidAddress(#[from] AddressError),

    #[error("{0}")]
    TooLarge(#[from] CartTooLarge),

    #[error("Unknown products: {}", join_ids(.0))]
    UnknownProducts(Vec<DocumentId>),

    #[error("No shipping data for: {}", join_ids(.0))]
    Unshippable(Vec<DocumentId>),

    #[error("{0}")]
    Pricing(#[from] PricingError),

    #[error("This order ships by freight and cannot be paid online")]
    Freight,

    #[error("Shipping rate is in {rate}, cart is in {cart}")]
    CurrencyMismatch { cart: CurrencyCode, rate: CurrencyCode },

    #[error("Invalid shipping rate: {0}")]
    InvalidRate(String),

    /// Re-quoting the cart failed.
    #[error(transparent)]
    Quote(#[from] QuoteError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] SanityError),

    #[error("Payment error: {0}")]
    Payment(#[from] StripeError),
}

fn join_ids(ids: &[DocumentId]) -> String {
    ids.iter()
        .map(DocumentId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Body of `POST /api/checkout`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(alias = "cart")]
    pub items: Vec<CartItem>,
    #[serde(alias = "destination")]
    pub address: Destination,
    /// The rate the shopper picked. Only its identity is used; the amount
    /// charged comes from a fresh quote.
    pub rate: ShippingRate,
    #[serde(default)]
    pub email: Option<String>,
}

/// Response of `POST /api/checkout`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Prices carts and opens hosted payment sessions.
#[derive(Clone)]
pub struct CheckoutService {
    catalog: Arc<dyn Catalog>,
    payments: Arc<dyn PaymentGateway>,
    quoter: ShippingQuoter,
    success_url: String,
    cancel_url: String,
}

impl CheckoutService {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn Catalog>,
        payments: Arc<dyn PaymentGateway>,
        quoter: ShippingQuoter,
        success_url: String,
        cancel_url: String,
    ) -> Self {
        Self {
            catalog,
            payments,
            quoter,
            success_url,
            cancel_url,
        }
    }

    /// Price the cart, re-quote shipping and create a payment session.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError` for an incomplete address, an oversized cart,
    /// unknown products or options, a freight or unshippable cart, a rate
    /// that is not currently offered, or a failing catalog, rate or payment
    /// provider.
    #[instrument(skip(self, request), fields(items = request.items.len()))]
    pub async fn create_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutResponse, CheckoutError> {
        request.address.validate()?;

        let lines: Vec<&CartItem> = request.items.iter().filter(|i| i.quantity > 0).collect();
        if lines.is_empty() {
            return Err(PricingError::EmptyCart.into());
        }
        cart_units(&request.items)?;

        let ids: Vec<DocumentId> = lines.iter().map(|i| i.id.clone()).collect();
        let products = self.catalog.pricing(&ids).await?;
        let by_id: HashMap<&DocumentId, _> = products.iter().map(|p| (&p.id, p)).collect();

        let mut unknown: Vec<DocumentId> = Vec::new();
        let mut pairs = Vec::with_capacity(lines.len());
        for item in lines {
            match by_id.get(&item.id) {
                Some(product) => pairs.push((item, *product)),
                None if !unknown.contains(&item.id) => unknown.push(item.id.clone()),
                None => {}
            }
        }
        if !unknown.is_empty() {
            return Err(CheckoutError::UnknownProducts(unknown));
        }

        let cart = price_cart(pairs)?;

        let quote = self
            .quoter
            .compute_shipping_quote(&request.items, &request.address)
            .await?;
        if quote.freight {
            return Err(CheckoutError::Freight);
        }
        if !quote.missing.is_empty() {
            return Err(CheckoutError::Unshippable(quote.missing));
        }
        let shipping = quote
            .rates
            .iter()
            .find(|offered| same_service(offered, &request.rate))
            .cloned()
            .ok_or_else(|| {
                CheckoutError::InvalidRate(format!(
                    "{} {} is not offered for this cart and address",
                    request.rate.carrier, request.rate.service
                ))
            })?;
        if shipping.amount != request.rate.amount {
            tracing::warn!(
                submitted = %request.rate.amount,
                quoted = %shipping.amount,
                service = %shipping.service,
                "Submitted rate amount differs from quote; charging quoted amount"
            );
        }

        if cart.currency() != shipping.currency {
            return Err(CheckoutError::CurrencyMismatch {
                cart: cart.currency(),
                rate: shipping.currency,
            });
        }

        let session = self
            .payments
            .create_checkout_session(&CheckoutSessionRequest {
                lines: cart.lines.iter().map(checkout_line).collect(),
                shipping: shipping.clone(),
                ship_to: request.address.clone(),
                customer_email: request
                    .email
                    .clone()
                    .or_else(|| request.address.email.clone())
                    .filter(|e| !e.trim().is_empty()),
                success_url: self.success_url.clone(),
                cancel_url: self.cancel_url.clone(),
            })
            .await?;

        tracing::info!(
            session_id = %session.id,
            subtotal = %cart.subtotal,
            shipping = %shipping.price(),
            "Payment session created"
        );

        Ok(CheckoutResponse {
            session_id: session.id,
            url: session.url,
            expires_at: session.expires_at,
        })
    }
}

/// Whether `offered` is the carrier service the shopper chose.
///
/// Rate IDs change on every rating call, so carrier and service codes are
/// compared when the IDs differ, falling back to display names.
fn same_service(offered: &ShippingRate, chosen: &ShippingRate) -> bool {
    if offered.rate_id.is_some() && offered.rate_id == chosen.rate_id {
        return true;
    }
    let carrier = match (&offered.carrier_id, &chosen.carrier_id) {
        (Some(a), Some(b)) => a == b,
        _ => offered.carrier.eq_ignore_ascii_case(&chosen.carrier),
    };
    let service = match (&offered.service_code, &chosen.service_code) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => offered.service.eq_ignore_ascii_case(&chosen.service),
    };
    carrier && service
}

fn checkout_line(line: &PricedLine) -> CheckoutLine {
    let name = if line.options.is_empty() {
        line.title.clone()
    } else {
        format!("{} ({})", line.title, line.options.join(", "))
    };
    CheckoutLine {
        name,
        unit_price: line.unit_price,
        quantity: line.quantity,
    }
}
