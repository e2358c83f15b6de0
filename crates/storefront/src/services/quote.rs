//! Shipping quotes.
//!
//! `compute_shipping_quote` validates the destination, looks up shipping
//! metadata for every cart line, builds one package per unit, checks freight
//! thresholds and, for parcel shipments only, asks the rate provider for
//! rates. Rates come back sorted ascending by amount.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tidewater_core::{
    AddressError, CartItem, CartTooLarge, Destination, DocumentId, FreightAssessment,
    MAX_CART_UNITS, PackageSpec, ShippingRate, cart_units, sort_rates,
};
use tracing::instrument;

use super::carriers::{CarrierError, CarrierResolver};
use super::packages::{PackageDefaults, build_packages};
use super::{Catalog, RateProvider, RateRequest};
use crate::sanity::SanityError;
use crate::shipengine::ShipEngineError;

/// Shipping class that always routes to freight.
const FREIGHT_CLASS: &str = "freight";

/// Errors from computing a quote.
#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("{0}")]
    InvalidAddress(#[from] AddressError),

    #[error("Cart has no items")]
    EmptyCart,

    #[error("{0}")]
    TooLarge(#[from] CartTooLarge),

    #[error("At least one package is required")]
    NoPackages,

    #[error("Shipping origin is not configured")]
    MissingOrigin,

    #[error("No carriers are connected to the shipping account")]
    NoCarriers,

    #[error("Catalog error: {0}")]
    Catalog(#[from] SanityError),

    /// The rate provider failed; `message` is the provider's own text.
    #[error("{message}")]
    Provider { status: Option<u16>, message: String },
}

impl From<ShipEngineError> for QuoteError {
    fn from(err: ShipEngineError) -> Self {
        Self::Provider {
            status: err.status(),
            message: err.provider_message(),
        }
    }
}

impl From<Arc<CarrierError>> for QuoteError {
    fn from(err: Arc<CarrierError>) -> Self {
        match err.as_ref() {
            CarrierError::NoCarriers => Self::NoCarriers,
            CarrierError::Provider(e) => Self::Provider {
                status: e.status(),
                message: e.provider_message(),
            },
        }
    }
}

/// A quote for a whole cart.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingQuote {
    pub packages: Vec<PackageSpec>,
    /// Cart IDs with no shipping metadata; they are not in `packages`.
    pub missing: Vec<DocumentId>,
    pub freight: bool,
    pub total_weight_lb: f64,
    pub max_dimension_in: f64,
    pub rates: Vec<ShippingRate>,
    pub best_rate: Option<ShippingRate>,
}

/// Rates for an explicit package list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateQuote {
    pub rates: Vec<ShippingRate>,
    pub best_rate: Option<ShippingRate>,
    pub freight: bool,
}

/// Origin and package defaults.
#[derive(Debug, Clone)]
pub struct QuoteSettings {
    pub origin: Option<Destination>,
    pub defaults: PackageDefaults,
}

/// Computes shipping quotes.
#[derive(Clone)]
pub struct ShippingQuoter {
    catalog: Arc<dyn Catalog>,
    rates: Arc<dyn RateProvider>,
    carriers: CarrierResolver,
    settings: QuoteSettings,
}

impl ShippingQuoter {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn Catalog>,
        rates: Arc<dyn RateProvider>,
        carriers: CarrierResolver,
        settings: QuoteSettings,
    ) -> Self {
        Self {
            catalog,
            rates,
            carriers,
            settings,
        }
    }

    /// Whether quotes can be computed at all.
    #[must_use]
    pub const fn has_origin(&self) -> bool {
        self.settings.origin.is_some()
    }

    /// Quote a cart to a destination.
    ///
    /// Items without shipping metadata are listed in `missing` and left out
    /// of the packages; they never abort the quote.
    ///
    /// # Errors
    ///
    /// Returns `QuoteError` for an incomplete address, an empty cart, a
    /// missing origin, or a failing catalog or rate provider.
    #[instrument(skip(self, items, destination), fields(items = items.len()))]
    pub async fn compute_shipping_quote(
        &self,
        items: &[CartItem],
        destination: &Destination,
    ) -> Result<ShippingQuote, QuoteError> {
        destination.validate()?;
        let ids: Vec<DocumentId> = items
            .iter()
            .filter(|i| i.quantity > 0)
            .map(|i| i.id.clone())
            .collect();
        if ids.is_empty() {
            return Err(QuoteError::EmptyCart);
        }
        cart_units(items)?;
        let origin = self.origin()?;

        let metadata = self.catalog.shipping_metadata(&ids).await?;
        let plan = build_packages(items, &metadata, self.settings.defaults);
        if !plan.missing.is_empty() {
            tracing::warn!(missing = ?plan.missing, "Cart items without shipping metadata");
        }

        let assessment = FreightAssessment::assess(&plan.packages);
        let freight = assessment.freight || has_freight_class(&plan.packages);

        let rates = if freight || plan.packages.is_empty() {
            Vec::new()
        } else {
            self.fetch_rates(origin, destination, &plan.packages).await?
        };

        tracing::info!(
            packages = plan.packages.len(),
            total_weight_lb = assessment.total_weight_lb,
            freight,
            rates = rates.len(),
            "Computed shipping quote"
        );

        Ok(ShippingQuote {
            best_rate: rates.first().cloned(),
            packages: plan.packages,
            missing: plan.missing,
            freight,
            total_weight_lb: assessment.total_weight_lb,
            max_dimension_in: assessment.max_dimension_in,
            rates,
        })
    }

    /// Rates for packages the caller already built. No catalog lookup.
    ///
    /// # Errors
    ///
    /// Returns `QuoteError` for an incomplete address, an empty package
    /// list, a missing origin, or a failing rate provider.
    #[instrument(skip(self, destination, packages), fields(packages = packages.len()))]
    pub async fn rates_for_packages(
        &self,
        destination: &Destination,
        packages: &[PackageSpec],
    ) -> Result<RateQuote, QuoteError> {
        destination.validate()?;
        if packages.is_empty() {
            return Err(QuoteError::NoPackages);
        }
        let units = u64::try_from(packages.len()).unwrap_or(u64::MAX);
        if units > u64::from(MAX_CART_UNITS) {
            return Err(CartTooLarge { units }.into());
        }
        let origin = self.origin()?;

        let freight = FreightAssessment::assess(packages).freight || has_freight_class(packages);
        let rates = if freight {
            Vec::new()
        } else {
            self.fetch_rates(origin, destination, packages).await?
        };

        Ok(RateQuote {
            best_rate: rates.first().cloned(),
            rates,
            freight,
        })
    }

    fn origin(&self) -> Result<&Destination, QuoteError> {
        self.settings.origin.as_ref().ok_or(QuoteError::MissingOrigin)
    }

    async fn fetch_rates(
        &self,
        origin: &Destination,
        destination: &Destination,
        packages: &[PackageSpec],
    ) -> Result<Vec<ShippingRate>, QuoteError> {
        let carrier_ids = self.carriers.resolve(self.rates.as_ref()).await?;
        let request = RateRequest {
            ship_from: origin.clone(),
            ship_to: destination.clone(),
            packages: packages.to_vec(),
            carrier_ids,
        };
        let rates = self.rates.get_rates(&request).await?;
        Ok(sort_rates(rates))
    }
}

fn has_freight_class(packages: &[PackageSpec]) -> bool {
    packages.iter().any(|p| {
        p.shipping_class
            .as_deref()
            .is_some_and(|class| class.trim().eq_ignore_ascii_case(FREIGHT_CLASS))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use tidewater_core::{CarrierId, Dimensions};

    use super::*;
    use crate::services::Carrier;
    use crate::services::testing::{FakeCatalog, FakeRates, destination, metadata, rate};

    fn settings(origin: Option<Destination>) -> QuoteSettings {
        QuoteSettings {
            origin,
            defaults: PackageDefaults {
                weight_lb: 1.0,
                dimensions: Dimensions::inches(12.0, 9.0, 4.0),
            },
        }
    }

    fn quoter(catalog: FakeCatalog, rates: Arc<FakeRates>) -> ShippingQuoter {
        ShippingQuoter::new(
            Arc::new(catalog),
            rates,
            CarrierResolver::new(vec![CarrierId::new("se-1")]),
            settings(Some(destination())),
        )
    }

    fn catalog() -> FakeCatalog {
        FakeCatalog {
            shipping: vec![metadata("sku-1", 5.0, "10x8x4")],
            ..FakeCatalog::default()
        }
    }

    fn provider() -> Arc<FakeRates> {
        Arc::new(FakeRates {
            rates: vec![
                rate("UPS", "Ground", Decimal::new(1899, 2)),
                rate("USPS", "Priority", Decimal::new(899, 2)),
                rate("FedEx", "Home", Decimal::new(1899, 2)),
            ],
            ..FakeRates::default()
        })
    }

    #[tokio::test]
    async fn test_two_units_make_two_packages() {
        let rates = provider();
        let quote = quoter(catalog(), rates.clone())
            .compute_shipping_quote(&[CartItem::new("sku-1", 2)], &destination())
            .await
            .unwrap();

        assert_eq!(quote.packages.len(), 2);
        assert!(quote.missing.is_empty());
        assert!(!quote.freight);
        assert!((quote.total_weight_lb - 10.0).abs() < f64::EPSILON);
        assert!((quote.max_dimension_in - 10.0).abs() < f64::EPSILON);

        let requests = rates.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].packages.len(), 2);
        assert_eq!(requests[0].carrier_ids, vec![CarrierId::new("se-1")]);
    }

    #[tokio::test]
    async fn test_rates_sorted_and_ties_keep_order() {
        let quote = quoter(catalog(), provider())
            .compute_shipping_quote(&[CartItem::new("sku-1", 1)], &destination())
            .await
            .unwrap();

        let carriers: Vec<&str> = quote.rates.iter().map(|r| r.carrier.as_str()).collect();
        assert_eq!(carriers, vec!["USPS", "UPS", "FedEx"]);
        assert_eq!(quote.best_rate.as_ref(), quote.rates.first());
    }

    #[tokio::test]
    async fn test_heavy_cart_goes_freight_without_rate_call() {
        let rates = provider();
        let quote = quoter(catalog(), rates.clone())
            .compute_shipping_quote(&[CartItem::new("sku-1", 30)], &destination())
            .await
            .unwrap();

        assert!(quote.freight);
        assert!(quote.rates.is_empty());
        assert!(quote.best_rate.is_none());
        assert_eq!(rates.rate_calls(), 0);
    }

    #[tokio::test]
    async fn test_oversized_box_goes_freight() {
        let catalog = FakeCatalog {
            shipping: vec![metadata("table", 40.0, "72x30x6")],
            ..FakeCatalog::default()
        };
        let quote = quoter(catalog, provider())
            .compute_shipping_quote(&[CartItem::new("table", 1)], &destination())
            .await
            .unwrap();

        assert!(quote.freight);
        assert!(quote.rates.is_empty());
    }

    #[tokio::test]
    async fn test_freight_shipping_class() {
        let mut meta = metadata("pallet", 20.0, "20x20x20");
        meta.shipping_class = Some("Freight".to_string());
        let catalog = FakeCatalog {
            shipping: vec![meta],
            ..FakeCatalog::default()
        };
        let rates = provider();

        let quote = quoter(catalog, rates.clone())
            .compute_shipping_quote(&[CartItem::new("pallet", 1)], &destination())
            .await
            .unwrap();

        assert!(quote.freight);
        assert_eq!(rates.rate_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_items_do_not_block_quote() {
        let quote = quoter(catalog(), provider())
            .compute_shipping_quote(
                &[CartItem::new("sku-1", 1), CartItem::new("ghost", 1)],
                &destination(),
            )
            .await
            .unwrap();

        assert_eq!(quote.missing, vec![DocumentId::new("ghost")]);
        assert_eq!(quote.packages.len(), 1);
        assert_eq!(quote.rates.len(), 3);
    }

    #[tokio::test]
    async fn test_all_items_missing_skips_rate_call() {
        let rates = provider();
        let quote = quoter(catalog(), rates.clone())
            .compute_shipping_quote(&[CartItem::new("ghost", 2)], &destination())
            .await
            .unwrap();

        assert!(quote.packages.is_empty());
        assert_eq!(quote.missing, vec![DocumentId::new("ghost")]);
        assert!(!quote.freight);
        assert_eq!(rates.rate_calls(), 0);
    }

    #[tokio::test]
    async fn test_incomplete_address_fails_before_any_lookup() {
        let rates = provider();
        let mut address = destination();
        address.postal_code = String::new();
        address.city = "  ".to_string();

        let err = quoter(FakeCatalog { fail: true, ..FakeCatalog::default() }, rates.clone())
            .compute_shipping_quote(&[CartItem::new("sku-1", 1)], &address)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Missing required address fields: city, postalCode");
        assert_eq!(rates.rate_calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_cart_rejected() {
        let err = quoter(catalog(), provider())
            .compute_shipping_quote(&[CartItem::new("sku-1", 0)], &destination())
            .await
            .unwrap_err();
        assert!(matches!(err, QuoteError::EmptyCart));
    }

    #[tokio::test]
    async fn test_huge_quantity_rejected_before_lookup() {
        let rates = provider();
        let err = quoter(FakeCatalog { fail: true, ..catalog() }, rates.clone())
            .compute_shipping_quote(&[CartItem::new("sku-1", 4_000_000_000)], &destination())
            .await
            .unwrap_err();

        assert!(matches!(err, QuoteError::TooLarge(CartTooLarge { units: 4_000_000_000 })));
        assert_eq!(rates.rate_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_origin() {
        let quoter = ShippingQuoter::new(
            Arc::new(catalog()),
            provider(),
            CarrierResolver::new(vec![]),
            settings(None),
        );
        let err = quoter
            .compute_shipping_quote(&[CartItem::new("sku-1", 1)], &destination())
            .await
            .unwrap_err();
        assert!(matches!(err, QuoteError::MissingOrigin));
        assert!(!quoter.has_origin());
    }

    #[tokio::test]
    async fn test_provider_message_passed_through() {
        let rates = Arc::new(FakeRates {
            error: Some("Invalid ship_to postal_code".to_string()),
            ..FakeRates::default()
        });
        let err = quoter(catalog(), rates)
            .compute_shipping_quote(&[CartItem::new("sku-1", 1)], &destination())
            .await
            .unwrap_err();

        assert!(matches!(err, QuoteError::Provider { status: Some(400), .. }));
        assert_eq!(err.to_string(), "Invalid ship_to postal_code");
    }

    #[tokio::test]
    async fn test_carriers_resolved_from_account_once() {
        let rates = Arc::new(FakeRates {
            carriers: vec![Carrier {
                carrier_id: CarrierId::new("se-42"),
                carrier_code: Some("usps".to_string()),
                friendly_name: None,
            }],
            rates: vec![rate("USPS", "Ground Advantage", Decimal::new(650, 2))],
            ..FakeRates::default()
        });
        let quoter = ShippingQuoter::new(
            Arc::new(catalog()),
            rates.clone(),
            CarrierResolver::new(vec![]),
            settings(Some(destination())),
        );

        for _ in 0..3 {
            quoter
                .compute_shipping_quote(&[CartItem::new("sku-1", 1)], &destination())
                .await
                .unwrap();
        }

        assert_eq!(rates.carrier_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        let requests = rates.requests.lock().unwrap();
        assert!(requests.iter().all(|r| r.carrier_ids == vec![CarrierId::new("se-42")]));
    }

    #[tokio::test]
    async fn test_rates_for_packages() {
        let packages = vec![PackageSpec {
            weight: tidewater_core::Weight::pounds(3.0),
            dimensions: Dimensions::inches(10.0, 8.0, 4.0),
            sku: None,
            title: None,
            ships_alone: false,
            shipping_class: None,
        }];
        let quote = quoter(FakeCatalog { fail: true, ..FakeCatalog::default() }, provider())
            .rates_for_packages(&destination(), &packages)
            .await
            .unwrap();

        assert!(!quote.freight);
        assert_eq!(quote.best_rate.unwrap().amount, Decimal::new(899, 2));

        let err = quoter(catalog(), provider())
            .rates_for_packages(&destination(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, QuoteError::NoPackages));
    }
}
