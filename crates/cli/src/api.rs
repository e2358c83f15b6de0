//! Minimal client for the storefront JSON API.

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tidewater_core::{CartItem, Destination, ShippingRate};
use url::Url;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Errors returned by the storefront API client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The storefront answered with an error body.
    #[error("API error: {status} - {message}")]
    Api {
        status: u16,
        message: String,
        request_id: Option<String>,
    },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ApiError {
    /// The message a shopper would see, without our prefix.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Http(e) => e.to_string(),
            Self::Api { message, .. } | Self::Parse(message) => message.clone(),
        }
    }
}

/// `POST /api/shipping/quote` response, reduced to what the CLI prints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    #[serde(default)]
    pub missing: Vec<String>,
    pub freight: bool,
    #[serde(default)]
    pub total_weight_lb: f64,
    #[serde(default)]
    pub max_dimension_in: f64,
    #[serde(default)]
    pub rates: Vec<ShippingRate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteBody<'a> {
    items: &'a [CartItem],
    destination: &'a Destination,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutBody<'a> {
    items: &'a [CartItem],
    address: &'a Destination,
    rate: &'a ShippingRate,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
}

/// `POST /api/checkout` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Storefront API client.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a client for the storefront at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(base_url: Url) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    /// Quote shipping for a cart.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or a non-2xx response.
    pub async fn quote(
        &self,
        items: &[CartItem],
        destination: &Destination,
    ) -> Result<QuoteResponse, ApiError> {
        let response = self
            .client
            .post(self.endpoint("/api/shipping/quote"))
            .json(&QuoteBody { items, destination })
            .send()
            .await?;
        read_json(response).await
    }

    /// Open a payment session for a cart and chosen rate.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or a non-2xx response.
    pub async fn checkout(
        &self,
        items: &[CartItem],
        address: &Destination,
        rate: &ShippingRate,
        email: Option<&str>,
    ) -> Result<CheckoutResponse, ApiError> {
        let response = self
            .client
            .post(self.endpoint("/api/checkout"))
            .json(&CheckoutBody {
                items,
                address,
                rate,
                email,
            })
            .send()
            .await?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    let request_id = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or_else(|_| body.chars().take(200).collect());
        tracing::debug!(status = %status, request_id = ?request_id, "Storefront request failed");
        return Err(ApiError::Api {
            status: status.as_u16(),
            message,
            request_id,
        });
    }

    serde_json::from_str(&body).map_err(|e| ApiError::Parse(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_ignores_trailing_slash() {
        let client = ApiClient::new(Url::parse("http://localhost:3000/").unwrap()).unwrap();
        assert_eq!(
            client.endpoint("/api/checkout"),
            "http://localhost:3000/api/checkout"
        );
    }

    #[test]
    fn test_quote_response_tolerates_extra_fields() {
        let json = r#"{
            "packages": [],
            "missing": ["prod-9"],
            "freight": false,
            "totalWeightLb": 4.5,
            "maxDimensionIn": 12.0,
            "rates": [{"carrier": "USPS", "service": "Ground Advantage", "amount": "7.25", "currency": "USD", "deliveryDays": 4}],
            "bestRate": null
        }"#;
        let quote: QuoteResponse = serde_json::from_str(json).unwrap();
        assert_eq!(quote.missing, vec!["prod-9".to_string()]);
        assert_eq!(quote.rates.len(), 1);
        assert_eq!(quote.rates[0].delivery_days, Some(4));
    }
}
