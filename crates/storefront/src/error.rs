//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side failures to
//! Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`; every error body is JSON `{"error": "..."}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::{CheckoutError, QuoteError};
use crate::stripe::{StripeError, WebhookError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Shipping quote failed.
    #[error("Quote error: {0}")]
    Quote(#[from] QuoteError),

    /// Payment session creation failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Webhook delivery rejected.
    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Quote(err) => quote_status(err),
            Self::Checkout(err) => match err {
                CheckoutError::InvalidAddress(_)
                | CheckoutError::TooLarge(_)
                | CheckoutError::UnknownProducts(_)
                | CheckoutError::Unshippable(_)
                | CheckoutError::Pricing(_)
                | CheckoutError::Freight
                | CheckoutError::CurrencyMismatch { .. }
                | CheckoutError::InvalidRate(_)
                | CheckoutError::Payment(StripeError::InvalidAmount(_)) => StatusCode::BAD_REQUEST,
                CheckoutError::Quote(err) => quote_status(err),
                CheckoutError::Catalog(_) | CheckoutError::Payment(_) => StatusCode::BAD_GATEWAY,
            },
            Self::Webhook(WebhookError::NotConfigured) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Webhook(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show the client.
    fn client_message(&self) -> String {
        match self {
            // Provider and validation messages are shown verbatim.
            Self::Quote(QuoteError::Catalog(_))
            | Self::Checkout(
                CheckoutError::Catalog(_) | CheckoutError::Quote(QuoteError::Catalog(_)),
            ) => "Content service unavailable".to_string(),
            Self::Quote(err) | Self::Checkout(CheckoutError::Quote(err)) => err.to_string(),
            Self::Checkout(CheckoutError::Payment(StripeError::Api { message, .. })) => {
                message.clone()
            }
            Self::Checkout(CheckoutError::Payment(StripeError::InvalidAmount(amount))) => {
                format!("Invalid amount: {amount}")
            }
            Self::Checkout(CheckoutError::Payment(_)) => "Payment service unavailable".to_string(),
            Self::Checkout(err) => err.to_string(),
            Self::Webhook(err) => err.to_string(),
        }
    }
}

const fn quote_status(err: &QuoteError) -> StatusCode {
    match err {
        QuoteError::InvalidAddress(_)
        | QuoteError::EmptyCart
        | QuoteError::TooLarge(_)
        | QuoteError::NoPackages => StatusCode::BAD_REQUEST,
        QuoteError::MissingOrigin | QuoteError::NoCarriers => StatusCode::INTERNAL_SERVER_ERROR,
        QuoteError::Catalog(_) | QuoteError::Provider { .. } => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        (status, Json(json!({ "error": self.client_message() }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for a checkout step.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of steps
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tidewater_core::{AddressError, CartTooLarge, PricingError};

    use super::*;
    use crate::sanity::SanityError;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_validation_errors_are_400_with_message() {
        let err = AppError::from(QuoteError::InvalidAddress(AddressError::MissingFields(vec![
            "postalCode",
        ])));
        let (status, body) = body_of(err).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required address fields: postalCode");
    }

    #[tokio::test]
    async fn test_missing_origin_is_500_with_message() {
        let (status, body) = body_of(QuoteError::MissingOrigin.into()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Shipping origin is not configured");
    }

    #[tokio::test]
    async fn test_provider_errors_are_502_verbatim() {
        let err = QuoteError::Provider {
            status: Some(400),
            message: "Invalid ship_to postal_code".to_string(),
        };
        let (status, body) = body_of(err.into()).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Invalid ship_to postal_code");
    }

    #[tokio::test]
    async fn test_catalog_details_hidden() {
        let err = QuoteError::Catalog(SanityError::Api {
            status: 401,
            message: "token sk-abc is invalid".to_string(),
        });
        let (status, body) = body_of(err.into()).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Content service unavailable");
    }

    #[tokio::test]
    async fn test_oversized_cart_is_400() {
        let err = QuoteError::TooLarge(CartTooLarge { units: 4_000_000_000 });
        let (status, body) = body_of(err.into()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "Cart holds 4000000000 units; at most 500 are allowed"
        );
    }

    #[tokio::test]
    async fn test_checkout_requote_errors_map_like_quotes() {
        let err = CheckoutError::Quote(QuoteError::Catalog(SanityError::Api {
            status: 500,
            message: "internal".to_string(),
        }));
        let (status, body) = body_of(err.into()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Content service unavailable");

        let (status, body) = body_of(CheckoutError::Quote(QuoteError::MissingOrigin).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Shipping origin is not configured");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::from(CheckoutError::Pricing(PricingError::EmptyCart)).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(WebhookError::InvalidSignature("mismatch".to_string())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(WebhookError::NotConfigured).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::from(CheckoutError::Freight).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(CheckoutError::InvalidRate("gone".to_string())).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
