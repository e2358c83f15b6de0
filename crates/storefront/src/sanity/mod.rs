//! Sanity content store client.
//!
//! # Architecture
//!
//! - Plain GROQ over HTTP (`GET /v{version}/data/query/{dataset}`) with `reqwest`
//! - Sanity is source of truth for shipping and pricing metadata - NO local sync
//! - In-memory caching via `moka` per document (5 minute TTL)
//!
//! Documents that do not exist are never cached, so a product published after
//! a failed lookup resolves on the next request.

mod cache;
pub mod queries;
mod types;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tidewater_core::{DocumentId, ProductPricing};
use tracing::{debug, instrument};

use crate::config::SanityConfig;
use crate::services::{Catalog, ShippingMetadata};

use cache::{CacheKey, CacheValue};
use types::{PricingDocument, ShippingDocument};

/// Errors that can occur when querying Sanity.
#[derive(Debug, Error)]
pub enum SanityError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Client for the Sanity query API.
#[derive(Clone)]
pub struct SanityClient {
    inner: Arc<SanityClientInner>,
}

struct SanityClientInner {
    client: reqwest::Client,
    endpoint: String,
    token: Option<SecretString>,
    cache: Cache<CacheKey, CacheValue>,
}

/// Envelope of every query response.
#[derive(Debug, Deserialize)]
struct QueryResponse<T> {
    result: Vec<T>,
}

/// Error body returned on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    description: Option<String>,
    message: Option<String>,
}

impl SanityClient {
    /// Create a new Sanity client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &SanityConfig, timeout: Duration) -> Result<Self, SanityError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        let cache = Cache::builder()
            .max_capacity(5_000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Ok(Self {
            inner: Arc::new(SanityClientInner {
                client,
                endpoint: config.query_endpoint(),
                token: config.token.clone(),
                cache,
            }),
        })
    }

    /// Run a GROQ query with an `$ids` parameter.
    async fn query<T: DeserializeOwned>(
        &self,
        groq: &str,
        ids: &[DocumentId],
    ) -> Result<Vec<T>, SanityError> {
        let ids_param =
            serde_json::to_string(ids).map_err(|e| SanityError::Parse(e.to_string()))?;

        let mut request = self
            .inner
            .client
            .get(&self.inner.endpoint)
            .query(&[("query", groq), ("$ids", ids_param.as_str())]);
        if let Some(token) = &self.inner.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error.description.or(e.error.message))
                .unwrap_or_else(|| body.chars().take(200).collect());
            tracing::error!(status = %status, message = %message, "Sanity query failed");
            return Err(SanityError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: QueryResponse<T> =
            serde_json::from_str(&body).map_err(|e| SanityError::Parse(e.to_string()))?;
        Ok(parsed.result)
    }

    /// Shipping metadata for the given product/variant IDs.
    ///
    /// IDs with no matching document are simply absent from the result.
    ///
    /// # Errors
    ///
    /// Returns `SanityError` if the query fails.
    #[instrument(skip(self), fields(ids = ids.len()))]
    pub async fn shipping_metadata(
        &self,
        ids: &[DocumentId],
    ) -> Result<Vec<ShippingMetadata>, SanityError> {
        let mut found = Vec::new();
        let mut uncached = Vec::new();

        for id in unique(ids) {
            match self.inner.cache.get(&CacheKey::Shipping(id.clone())).await {
                Some(CacheValue::Shipping(metadata)) => found.push(*metadata),
                _ => uncached.push(id),
            }
        }

        if !uncached.is_empty() {
            debug!(count = uncached.len(), "Fetching shipping metadata from Sanity");
            let documents: Vec<ShippingDocument> =
                self.query(queries::SHIPPING_METADATA, &uncached).await?;
            for document in documents {
                let metadata = ShippingMetadata::from(document);
                self.inner
                    .cache
                    .insert(
                        CacheKey::Shipping(metadata.id.clone()),
                        CacheValue::Shipping(Box::new(metadata.clone())),
                    )
                    .await;
                found.push(metadata);
            }
        }

        Ok(found)
    }

    /// Pricing for the given product/variant IDs.
    ///
    /// Documents without a price or with an unsupported currency are skipped.
    ///
    /// # Errors
    ///
    /// Returns `SanityError` if the query fails.
    #[instrument(skip(self), fields(ids = ids.len()))]
    pub async fn pricing(&self, ids: &[DocumentId]) -> Result<Vec<ProductPricing>, SanityError> {
        let mut found = Vec::new();
        let mut uncached = Vec::new();

        for id in unique(ids) {
            match self.inner.cache.get(&CacheKey::Pricing(id.clone())).await {
                Some(CacheValue::Pricing(pricing)) => found.push(*pricing),
                _ => uncached.push(id),
            }
        }

        if !uncached.is_empty() {
            debug!(count = uncached.len(), "Fetching pricing from Sanity");
            let documents: Vec<PricingDocument> =
                self.query(queries::PRODUCT_PRICING, &uncached).await?;
            for document in documents {
                let id = document.id.clone();
                let Some(pricing) = document.into_pricing() else {
                    tracing::warn!(id = %id, "Sanity document has no usable price");
                    continue;
                };
                self.inner
                    .cache
                    .insert(
                        CacheKey::Pricing(pricing.id.clone()),
                        CacheValue::Pricing(Box::new(pricing.clone())),
                    )
                    .await;
                found.push(pricing);
            }
        }

        Ok(found)
    }
}

#[async_trait]
impl Catalog for SanityClient {
    async fn shipping_metadata(
        &self,
        ids: &[DocumentId],
    ) -> Result<Vec<ShippingMetadata>, SanityError> {
        Self::shipping_metadata(self, ids).await
    }

    async fn pricing(&self, ids: &[DocumentId]) -> Result<Vec<ProductPricing>, SanityError> {
        Self::pricing(self, ids).await
    }
}

/// De-duplicate IDs, keeping a stable order.
fn unique(ids: &[DocumentId]) -> Vec<DocumentId> {
    ids.iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .cloned()
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sanity_error_display() {
        let err = SanityError::Api {
            status: 400,
            message: "expected '}' following object body".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "API error: 400 - expected '}' following object body"
        );
    }

    #[test]
    fn test_unique_ids() {
        let ids = vec![
            DocumentId::new("b"),
            DocumentId::new("a"),
            DocumentId::new("b"),
        ];
        assert_eq!(unique(&ids), vec![DocumentId::new("a"), DocumentId::new("b")]);
    }

    #[test]
    fn test_error_body_parsing() {
        let body = r#"{"error":{"description":"param $ids referenced, but not provided","type":"queryParseError"}}"#;
        let parsed: ErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.error.description.as_deref(),
            Some("param $ids referenced, but not provided")
        );
    }
}
