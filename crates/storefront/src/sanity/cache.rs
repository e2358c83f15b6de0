//! Cache types for Sanity query results.

use tidewater_core::{DocumentId, ProductPricing};

use crate::services::ShippingMetadata;

/// Cache key per document and projection.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Shipping(DocumentId),
    Pricing(DocumentId),
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Shipping(Box<ShippingMetadata>),
    Pricing(Box<ProductPricing>),
}
