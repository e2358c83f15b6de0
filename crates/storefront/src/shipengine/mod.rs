//! ShipEngine rate API client.
//!
//! Only two endpoints are used: `POST /v1/rates` for quoting and
//! `GET /v1/carriers` to discover the account's carriers when none are
//! configured. Rates are returned unsorted, in provider order.

mod types;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tidewater_core::ShippingRate;
use tracing::instrument;
use url::Url;

use crate::config::ShipEngineConfig;
use crate::services::{Carrier, RateProvider, RateRequest};

use types::{CarriersResponse, ErrorResponse, RatesBody, RatesResponse};

/// Errors that can occur when interacting with ShipEngine.
#[derive(Debug, Error)]
pub enum ShipEngineError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The request succeeded but rating itself failed.
    #[error("Rating failed: {}", .0.join("; "))]
    RateErrors(Vec<String>),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ShipEngineError {
    /// The provider's own message, without our prefix.
    #[must_use]
    pub fn provider_message(&self) -> String {
        match self {
            Self::Http(e) => e.to_string(),
            Self::Api { message, .. } | Self::Parse(message) => message.clone(),
            Self::RateErrors(messages) => messages.join("; "),
        }
    }

    /// HTTP status returned by the provider, if it answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Api { status, .. } => Some(*status),
            Self::RateErrors(_) | Self::Parse(_) => None,
        }
    }
}

/// ShipEngine API client.
#[derive(Clone)]
pub struct ShipEngineClient {
    client: reqwest::Client,
    base_url: Url,
}

impl ShipEngineClient {
    /// Create a new ShipEngine client.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &ShipEngineConfig, timeout: Duration) -> Result<Self, ShipEngineError> {
        let mut headers = HeaderMap::new();
        let mut api_key = HeaderValue::from_str(config.api_key.expose_secret())
            .map_err(|e| ShipEngineError::Parse(format!("Invalid API key format: {e}")))?;
        api_key.set_sensitive(true);
        headers.insert("API-Key", api_key);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    /// Quote a shipment.
    ///
    /// # Errors
    ///
    /// Returns `ShipEngineError` on transport failure, a non-2xx response,
    /// or a rate response that carries only errors.
    #[instrument(skip(self, request), fields(packages = request.packages.len(), carriers = request.carrier_ids.len()))]
    pub async fn get_rates(&self, request: &RateRequest) -> Result<Vec<ShippingRate>, ShipEngineError> {
        let response = self
            .client
            .post(self.endpoint("/v1/rates"))
            .json(&RatesBody::new(request))
            .send()
            .await?;
        let parsed: RatesResponse = read_json(response).await?;
        let rate_response = parsed.rate_response;

        let raw_count = rate_response.rates.len();
        let rates: Vec<ShippingRate> = rate_response
            .rates
            .into_iter()
            .filter_map(types::RawRate::normalize)
            .collect();

        if rates.is_empty() && !rate_response.errors.is_empty() {
            let messages = rate_response
                .errors
                .into_iter()
                .filter_map(|e| e.message)
                .collect::<Vec<_>>();
            tracing::warn!(errors = ?messages, "ShipEngine returned no rates");
            return Err(ShipEngineError::RateErrors(messages));
        }

        tracing::debug!(raw = raw_count, usable = rates.len(), "Received rates");
        Ok(rates)
    }

    /// Carriers connected to the account.
    ///
    /// # Errors
    ///
    /// Returns `ShipEngineError` on transport failure or a non-2xx response.
    #[instrument(skip(self))]
    pub async fn list_carriers(&self) -> Result<Vec<Carrier>, ShipEngineError> {
        let response = self.client.get(self.endpoint("/v1/carriers")).send().await?;
        let parsed: CarriersResponse = read_json(response).await?;
        Ok(parsed.carriers.into_iter().map(Carrier::from).collect())
    }
}

#[async_trait]
impl RateProvider for ShipEngineClient {
    async fn list_carriers(&self) -> Result<Vec<Carrier>, ShipEngineError> {
        Self::list_carriers(self).await
    }

    async fn get_rates(&self, request: &RateRequest) -> Result<Vec<ShippingRate>, ShipEngineError> {
        Self::get_rates(self, request).await
    }
}

/// Parse a 2xx body, or turn anything else into `ShipEngineError::Api`.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ShipEngineError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .ok()
            .and_then(ErrorResponse::joined)
            .unwrap_or_else(|| body.chars().take(200).collect());
        tracing::error!(status = %status, message = %message, "ShipEngine request failed");
        return Err(ShipEngineError::Api {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|e| ShipEngineError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_message_is_verbatim() {
        let err = ShipEngineError::Api {
            status: 400,
            message: "Invalid postal_code".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 400 - Invalid postal_code");
        assert_eq!(err.provider_message(), "Invalid postal_code");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_rate_errors_message() {
        let err = ShipEngineError::RateErrors(vec![
            "Weight exceeds carrier maximum".to_string(),
            "Service unavailable".to_string(),
        ]);
        assert_eq!(
            err.provider_message(),
            "Weight exceeds carrier maximum; Service unavailable"
        );
        assert_eq!(err.status(), None);
    }
}
