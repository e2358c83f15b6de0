//! Stripe Checkout client.
//!
//! Creates hosted Checkout Sessions over Stripe's form-encoded REST API and
//! verifies webhook signatures. Prices always come from the content store;
//! the client never trusts amounts from the browser.

pub mod webhook;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tidewater_core::Price;
use tracing::instrument;
use url::Url;

use crate::config::StripeConfig;
use crate::services::{CheckoutSession, CheckoutSessionRequest, PaymentGateway};

pub use webhook::{WebhookError, WebhookEvent, verify_signature};

/// Errors that can occur when interacting with Stripe.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// An amount cannot be expressed in minor units.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    base_url: Url,
    secret_key: SecretString,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StripeConfig, timeout: Duration) -> Result<Self, StripeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            secret_key: config.secret_key.clone(),
        })
    }

    /// Create a hosted Checkout Session in `payment` mode.
    ///
    /// # Errors
    ///
    /// Returns `StripeError` if an amount is out of range, the request fails,
    /// or Stripe rejects it.
    #[instrument(skip(self, request), fields(lines = request.lines.len()))]
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeError> {
        let params = session_params(request)?;
        let url = format!(
            "{}/v1/checkout/sessions",
            self.base_url.as_str().trim_end_matches('/')
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(self.secret_key.expose_secret())
            .form(&params)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or_else(|| body.chars().take(200).collect());
            tracing::error!(status = %status, message = %message, "Stripe request failed");
            return Err(StripeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let session: SessionResponse =
            serde_json::from_str(&body).map_err(|e| StripeError::Parse(e.to_string()))?;
        let url = session
            .url
            .ok_or_else(|| StripeError::Parse("checkout session has no url".to_string()))?;

        tracing::info!(session_id = %session.id, "Created checkout session");
        Ok(CheckoutSession {
            id: session.id,
            url,
            expires_at: session.expires_at,
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeError> {
        Self::create_checkout_session(self, request).await
    }
}

/// Form parameters for `POST /v1/checkout/sessions`.
fn session_params(request: &CheckoutSessionRequest) -> Result<Vec<(String, String)>, StripeError> {
    let mut params: Vec<(String, String)> = vec![
        ("mode".into(), "payment".into()),
        ("success_url".into(), request.success_url.clone()),
        ("cancel_url".into(), request.cancel_url.clone()),
    ];

    if let Some(email) = &request.customer_email {
        params.push(("customer_email".into(), email.clone()));
    }

    for (i, line) in request.lines.iter().enumerate() {
        let prefix = format!("line_items[{i}]");
        params.extend([
            (
                format!("{prefix}[price_data][currency]"),
                currency_param(line.unit_price),
            ),
            (
                format!("{prefix}[price_data][product_data][name]"),
                line.name.clone(),
            ),
            (
                format!("{prefix}[price_data][unit_amount]"),
                minor_units(line.unit_price)?.to_string(),
            ),
            (format!("{prefix}[quantity]"), line.quantity.to_string()),
        ]);
    }

    let rate = &request.shipping;
    let shipping = "shipping_options[0][shipping_rate_data]";
    params.extend([
        (format!("{shipping}[type]"), "fixed_amount".to_string()),
        (
            format!("{shipping}[display_name]"),
            format!("{} {}", rate.carrier, rate.service),
        ),
        (
            format!("{shipping}[fixed_amount][amount]"),
            minor_units(rate.price())?.to_string(),
        ),
        (
            format!("{shipping}[fixed_amount][currency]"),
            currency_param(rate.price()),
        ),
    ]);
    if let Some(days) = rate.delivery_days.filter(|d| *d > 0) {
        for bound in ["minimum", "maximum"] {
            params.push((
                format!("{shipping}[delivery_estimate][{bound}][unit]"),
                "business_day".to_string(),
            ));
            params.push((
                format!("{shipping}[delivery_estimate][{bound}][value]"),
                days.to_string(),
            ));
        }
    }

    let to = &request.ship_to;
    let metadata = [
        ("carrier", Some(rate.carrier.as_str())),
        ("service_code", rate.service_code.as_deref()),
        ("rate_id", rate.rate_id.as_ref().map(|id| id.as_str())),
        ("ship_to_name", to.name.as_deref()),
        ("ship_to_line1", Some(to.address_line1.as_str())),
        ("ship_to_line2", to.address_line2.as_deref()),
        ("ship_to_city", Some(to.city.as_str())),
        ("ship_to_state", Some(to.state.as_str())),
        ("ship_to_postal_code", Some(to.postal_code.as_str())),
        ("ship_to_country", Some(to.country.as_str())),
    ];
    params.extend(metadata.into_iter().filter_map(|(key, value)| {
        value.map(|v| (format!("metadata[{key}]"), v.to_string()))
    }));

    Ok(params)
}

fn minor_units(price: Price) -> Result<i64, StripeError> {
    price
        .to_minor_units()
        .ok_or_else(|| StripeError::InvalidAmount(price.to_string()))
}

fn currency_param(price: Price) -> String {
    price.currency_code.code().to_lowercase()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use tidewater_core::CurrencyCode;

    use super::*;
    use crate::services::CheckoutLine;
    use crate::services::testing::{destination, rate};

    fn request() -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            lines: vec![CheckoutLine {
                name: "Cedar Planter (Finish: Oiled)".to_string(),
                unit_price: Price::new(Decimal::new(5450, 2), CurrencyCode::USD),
                quantity: 2,
            }],
            shipping: rate("UPS", "Ground", Decimal::new(1299, 2)),
            ship_to: destination(),
            customer_email: Some("ada@example.test".to_string()),
            success_url: "https://shop.test/checkout/success".to_string(),
            cancel_url: "https://shop.test/cart".to_string(),
        }
    }

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_session_params() {
        let params = session_params(&request()).unwrap();

        assert_eq!(param(&params, "mode"), Some("payment"));
        assert_eq!(param(&params, "customer_email"), Some("ada@example.test"));
        assert_eq!(param(&params, "line_items[0][price_data][unit_amount]"), Some("5450"));
        assert_eq!(param(&params, "line_items[0][price_data][currency]"), Some("usd"));
        assert_eq!(param(&params, "line_items[0][quantity]"), Some("2"));
        assert_eq!(
            param(&params, "shipping_options[0][shipping_rate_data][fixed_amount][amount]"),
            Some("1299")
        );
        assert_eq!(
            param(&params, "shipping_options[0][shipping_rate_data][display_name]"),
            Some("UPS Ground")
        );
        assert_eq!(
            param(
                &params,
                "shipping_options[0][shipping_rate_data][delivery_estimate][maximum][value]"
            ),
            Some("3")
        );
        assert_eq!(param(&params, "metadata[ship_to_postal_code]"), Some("97201"));
        assert_eq!(param(&params, "metadata[ship_to_line2]"), None);
    }

    #[test]
    fn test_session_response_parsing() {
        let body = r#"{"id":"cs_test_a1","object":"checkout.session","url":"https://checkout.stripe.com/c/pay/cs_test_a1","expires_at":1792454400}"#;
        let session: SessionResponse = serde_json::from_str(body).unwrap();

        assert_eq!(session.id, "cs_test_a1");
        assert_eq!(session.expires_at.unwrap().timestamp(), 1_792_454_400);
    }

    #[test]
    fn test_stripe_error_display() {
        let err = StripeError::Api {
            status: 400,
            message: "Invalid email address: nope".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 400 - Invalid email address: nope");
    }
}
