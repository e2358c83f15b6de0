//! Business services and the seams to third-party APIs.
//!
//! Route handlers talk to Sanity, ShipEngine and Stripe only through the
//! traits below, so the quote engine and checkout flow run unchanged against
//! in-memory fakes in tests.

pub mod carriers;
pub mod checkout;
pub mod packages;
pub mod quote;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tidewater_core::{
    CarrierId, Destination, DocumentId, PackageSpec, Price, ProductPricing, ShippingRate,
};

use crate::sanity::SanityError;
use crate::shipengine::ShipEngineError;
use crate::stripe::StripeError;

pub use carriers::CarrierResolver;
pub use checkout::{CheckoutError, CheckoutRequest, CheckoutResponse, CheckoutService};
pub use quote::{QuoteError, QuoteSettings, RateQuote, ShippingQuote, ShippingQuoter};

/// Shipping fields of one product or variant after parent fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct ShippingMetadata {
    pub id: DocumentId,
    pub title: Option<String>,
    pub sku: Option<String>,
    pub weight_lb: Option<f64>,
    /// Raw box string, e.g. `"10x8x4"`.
    pub box_dimensions: Option<String>,
    pub ships_alone: bool,
    pub shipping_class: Option<String>,
}

/// Read access to product data in the content store.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Shipping metadata for the IDs that exist; unknown IDs are omitted.
    async fn shipping_metadata(
        &self,
        ids: &[DocumentId],
    ) -> Result<Vec<ShippingMetadata>, SanityError>;

    /// Pricing for the IDs that exist; unknown IDs are omitted.
    async fn pricing(&self, ids: &[DocumentId]) -> Result<Vec<ProductPricing>, SanityError>;
}

/// A carrier account available for rating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Carrier {
    pub carrier_id: CarrierId,
    pub carrier_code: Option<String>,
    pub friendly_name: Option<String>,
}

/// A normalized rate request.
#[derive(Debug, Clone)]
pub struct RateRequest {
    pub ship_from: Destination,
    pub ship_to: Destination,
    pub packages: Vec<PackageSpec>,
    pub carrier_ids: Vec<CarrierId>,
}

/// Carrier-rate aggregation API.
#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn list_carriers(&self) -> Result<Vec<Carrier>, ShipEngineError>;

    /// Rates in provider order; sorting is the caller's job.
    async fn get_rates(&self, request: &RateRequest) -> Result<Vec<ShippingRate>, ShipEngineError>;
}

/// One line of a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutLine {
    pub name: String,
    pub unit_price: Price,
    pub quantity: u32,
}

/// Everything the payment provider needs to host a checkout page.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub lines: Vec<CheckoutLine>,
    pub shipping: ShippingRate,
    pub ship_to: Destination,
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

/// A created hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Hosted payment page provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory collaborators for unit tests.

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    pub struct FakeCatalog {
        pub shipping: Vec<ShippingMetadata>,
        pub pricing: Vec<ProductPricing>,
        pub fail: bool,
    }

    #[async_trait]
    impl Catalog for FakeCatalog {
        async fn shipping_metadata(
            &self,
            ids: &[DocumentId],
        ) -> Result<Vec<ShippingMetadata>, SanityError> {
            if self.fail {
                return Err(SanityError::Api {
                    status: 503,
                    message: "dataset unavailable".to_string(),
                });
            }
            Ok(self
                .shipping
                .iter()
                .filter(|m| ids.contains(&m.id))
                .cloned()
                .collect())
        }

        async fn pricing(&self, ids: &[DocumentId]) -> Result<Vec<ProductPricing>, SanityError> {
            if self.fail {
                return Err(SanityError::Api {
                    status: 503,
                    message: "dataset unavailable".to_string(),
                });
            }
            Ok(self
                .pricing
                .iter()
                .filter(|p| ids.contains(&p.id))
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    pub struct FakeRates {
        pub carriers: Vec<Carrier>,
        pub rates: Vec<ShippingRate>,
        pub error: Option<String>,
        pub carrier_calls: AtomicUsize,
        pub requests: Mutex<Vec<RateRequest>>,
    }

    impl FakeRates {
        pub fn rate_calls(&self) -> usize {
            self.requests.lock().map_or(0, |r| r.len())
        }
    }

    #[async_trait]
    impl RateProvider for FakeRates {
        async fn list_carriers(&self) -> Result<Vec<Carrier>, ShipEngineError> {
            self.carrier_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.carriers.clone())
        }

        async fn get_rates(
            &self,
            request: &RateRequest,
        ) -> Result<Vec<ShippingRate>, ShipEngineError> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request.clone());
            }
            match &self.error {
                Some(message) => Err(ShipEngineError::Api {
                    status: 400,
                    message: message.clone(),
                }),
                None => Ok(self.rates.clone()),
            }
        }
    }

    #[derive(Default)]
    pub struct FakePayments {
        pub requests: Mutex<Vec<CheckoutSessionRequest>>,
        pub error: Option<String>,
    }

    #[async_trait]
    impl PaymentGateway for FakePayments {
        async fn create_checkout_session(
            &self,
            request: &CheckoutSessionRequest,
        ) -> Result<CheckoutSession, StripeError> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request.clone());
            }
            if let Some(message) = &self.error {
                return Err(StripeError::Api {
                    status: 402,
                    message: message.clone(),
                });
            }
            Ok(CheckoutSession {
                id: "cs_test_123".to_string(),
                url: "https://checkout.stripe.com/c/pay/cs_test_123".to_string(),
                expires_at: None,
            })
        }
    }

    pub fn metadata(id: &str, weight_lb: f64, box_dimensions: &str) -> ShippingMetadata {
        ShippingMetadata {
            id: DocumentId::new(id),
            title: Some(format!("Product {id}")),
            sku: Some(id.to_uppercase()),
            weight_lb: Some(weight_lb),
            box_dimensions: Some(box_dimensions.to_string()),
            ships_alone: false,
            shipping_class: None,
        }
    }

    pub fn rate(carrier: &str, service: &str, amount: rust_decimal::Decimal) -> ShippingRate {
        ShippingRate {
            rate_id: Some(tidewater_core::RateId::new(format!("se-{carrier}-{service}"))),
            carrier: carrier.to_string(),
            carrier_id: Some(CarrierId::new(format!("se-{carrier}"))),
            service: service.to_string(),
            service_code: Some(service.to_lowercase().replace(' ', "_")),
            amount,
            currency: tidewater_core::CurrencyCode::USD,
            delivery_days: Some(3),
            estimated_delivery_date: None,
        }
    }

    pub fn destination() -> Destination {
        Destination {
            name: Some("Ada Lovelace".to_string()),
            address_line1: "500 Harbor Way".to_string(),
            city: "Portland".to_string(),
            state: "OR".to_string(),
            postal_code: "97201".to_string(),
            country: "US".to_string(),
            ..Destination::default()
        }
    }
}
