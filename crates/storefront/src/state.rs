//! Application state shared across handlers.

use std::sync::Arc;

use thiserror::Error;

use crate::config::StorefrontConfig;
use crate::sanity::{SanityClient, SanityError};
use crate::services::packages::PackageDefaults;
use crate::services::{
    Catalog, CarrierResolver, CheckoutService, PaymentGateway, QuoteSettings, RateProvider,
    ShippingQuoter,
};
use crate::shipengine::{ShipEngineClient, ShipEngineError};
use crate::stripe::{StripeClient, StripeError};

/// Error building the upstream API clients.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Sanity client: {0}")]
    Sanity(#[from] SanityError),
    #[error("ShipEngine client: {0}")]
    ShipEngine(#[from] ShipEngineError),
    #[error("Stripe client: {0}")]
    Stripe(#[from] StripeError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// configuration and the quote and checkout services.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    quoter: ShippingQuoter,
    checkout: CheckoutService,
}

impl AppState {
    /// Create a new application state backed by the real Sanity, ShipEngine
    /// and Stripe clients.
    ///
    /// # Errors
    ///
    /// Returns an error if any HTTP client fails to build.
    pub fn new(config: StorefrontConfig) -> Result<Self, StateError> {
        let catalog = SanityClient::new(&config.sanity, config.http_timeout)?;
        let rates = ShipEngineClient::new(&config.shipengine, config.http_timeout)?;
        let payments = StripeClient::new(&config.stripe, config.http_timeout)?;

        Ok(Self::with_services(
            config,
            Arc::new(catalog),
            Arc::new(rates),
            Arc::new(payments),
        ))
    }

    /// Create application state over arbitrary collaborators.
    #[must_use]
    pub fn with_services(
        config: StorefrontConfig,
        catalog: Arc<dyn Catalog>,
        rates: Arc<dyn RateProvider>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        let quoter = ShippingQuoter::new(
            Arc::clone(&catalog),
            rates,
            CarrierResolver::new(config.shipengine.carrier_ids.clone()),
            QuoteSettings {
                origin: config.shipping.origin.clone(),
                defaults: PackageDefaults {
                    weight_lb: config.shipping.default_weight_lb,
                    dimensions: config.shipping.default_dimensions,
                },
            },
        );
        let checkout = CheckoutService::new(
            catalog,
            payments,
            quoter.clone(),
            config.checkout_success_url(),
            config.checkout_cancel_url(),
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                quoter,
                checkout,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the shipping quote service.
    #[must_use]
    pub fn quoter(&self) -> &ShippingQuoter {
        &self.inner.quoter
    }

    /// Get a reference to the checkout service.
    #[must_use]
    pub fn checkout(&self) -> &CheckoutService {
        &self.inner.checkout
    }
}
