//! Integration tests for Tidewater.
//!
//! # Running Tests
//!
//! ```bash
//! # In-process tests (fake Sanity, ShipEngine and Stripe)
//! cargo test -p tidewater-integration-tests
//!
//! # Live tests against a running storefront
//! TIDEWATER_API_URL=http://localhost:3000 cargo test -p tidewater-integration-tests -- --ignored
//! ```
//!
//! [`TestApp::spawn`] serves the real router on an ephemeral port with
//! in-memory collaborators behind the storefront's service traits, so tests
//! exercise routing, extraction, error mapping and middleware over HTTP.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use secrecy::SecretString;
use sha2::Sha256;
use tidewater_core::{
    CarrierId, CurrencyCode, Destination, Dimensions, DocumentId, OptionChoice, OptionGroup, Price,
    ProductPricing, ShippingRate,
};
use tidewater_storefront::config::{
    SanityConfig, ShipEngineConfig, ShippingConfig, StorefrontConfig, StripeConfig,
};
use tidewater_storefront::sanity::SanityError;
use tidewater_storefront::services::{
    Carrier, Catalog, CheckoutSession, CheckoutSessionRequest, PaymentGateway, RateProvider,
    RateRequest, ShippingMetadata,
};
use tidewater_storefront::shipengine::ShipEngineError;
use tidewater_storefront::state::AppState;
use tidewater_storefront::stripe::StripeError;
use url::Url;

/// Webhook signing secret used by [`test_config`].
pub const WEBHOOK_SECRET: &str = "whsec_integration";

/// Base URL of a live storefront for `#[ignore]`d tests.
#[must_use]
pub fn live_base_url() -> String {
    std::env::var("TIDEWATER_API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

// =============================================================================
// Fixtures
// =============================================================================

/// Warehouse in Tacoma.
#[must_use]
pub fn origin() -> Destination {
    Destination {
        name: Some("Tidewater Goods".to_string()),
        address_line1: "100 Dock St".to_string(),
        city: "Tacoma".to_string(),
        state: "WA".to_string(),
        postal_code: "98402".to_string(),
        country: "US".to_string(),
        ..Destination::default()
    }
}

/// A complete shopper address.
#[must_use]
pub fn shopper_address() -> Destination {
    Destination {
        name: Some("Ada Lovelace".to_string()),
        email: Some("ada@example.com".to_string()),
        address_line1: "1 Main St".to_string(),
        city: "Portland".to_string(),
        state: "OR".to_string(),
        postal_code: "97201".to_string(),
        country: "US".to_string(),
        ..Destination::default()
    }
}

/// Configuration for an in-process app; no field points at a real service.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        host: Ipv4Addr::LOCALHOST.into(),
        port: 0,
        base_url: Url::parse("http://localhost:3000").unwrap(),
        sanity: SanityConfig {
            project_id: "test".to_string(),
            dataset: "test".to_string(),
            api_version: "2024-01-01".to_string(),
            token: None,
            api_host: None,
        },
        shipengine: ShipEngineConfig {
            api_key: SecretString::from("TEST_shipengine"),
            base_url: Url::parse("http://127.0.0.1:9").unwrap(),
            carrier_ids: vec![CarrierId::new("se-usps")],
        },
        shipping: ShippingConfig {
            origin: Some(origin()),
            default_weight_lb: 1.0,
            default_dimensions: Dimensions::inches(12.0, 10.0, 4.0),
        },
        stripe: StripeConfig {
            secret_key: SecretString::from("sk_test_integration"),
            webhook_secret: Some(SecretString::from(WEBHOOK_SECRET)),
            base_url: Url::parse("http://127.0.0.1:9").unwrap(),
            success_path: "/checkout/success".to_string(),
            cancel_path: "/cart".to_string(),
        },
        http_timeout: Duration::from_secs(5),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// Shipping metadata for a single product.
#[must_use]
pub fn shipping(id: &str, weight_lb: f64, box_dimensions: &str) -> ShippingMetadata {
    ShippingMetadata {
        id: DocumentId::new(id),
        title: Some(id.to_string()),
        sku: None,
        weight_lb: Some(weight_lb),
        box_dimensions: Some(box_dimensions.to_string()),
        ships_alone: false,
        shipping_class: None,
    }
}

/// A hammock priced at 89.00 USD with a stand upgrade.
#[must_use]
pub fn hammock_pricing() -> ProductPricing {
    ProductPricing {
        id: DocumentId::new("prod-hammock"),
        title: "Rope Hammock".to_string(),
        base_price: Price::new(Decimal::new(8_900, 2), CurrencyCode::USD),
        option_groups: vec![OptionGroup {
            key: "stand".to_string(),
            label: Some("Stand".to_string()),
            choices: vec![
                OptionChoice {
                    key: "none".to_string(),
                    label: Some("No stand".to_string()),
                    surcharge: Decimal::ZERO,
                },
                OptionChoice {
                    key: "steel".to_string(),
                    label: Some("Steel stand".to_string()),
                    surcharge: Decimal::new(4_500, 2),
                },
            ],
        }],
    }
}

/// A USD rate.
#[must_use]
pub fn rate(carrier: &str, service: &str, cents: i64) -> ShippingRate {
    ShippingRate {
        rate_id: Some(format!("se-{}", service.to_lowercase().replace(' ', "-")).into()),
        carrier: carrier.to_string(),
        carrier_id: Some(CarrierId::new(format!("se-{}", carrier.to_lowercase()))),
        service: service.to_string(),
        service_code: Some(service.to_lowercase().replace(' ', "_")),
        amount: Decimal::new(cents, 2),
        currency: CurrencyCode::USD,
        delivery_days: Some(3),
        estimated_delivery_date: None,
    }
}

/// Stripe-style signature header for `payload` signed at `timestamp`.
#[must_use]
pub fn sign_webhook(secret: &str, timestamp: i64, payload: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

// =============================================================================
// In-memory collaborators
// =============================================================================

/// Product data served from memory.
#[derive(Default)]
pub struct StubCatalog {
    pub shipping: Vec<ShippingMetadata>,
    pub pricing: Vec<ProductPricing>,
    pub unavailable: bool,
}

impl StubCatalog {
    fn check(&self) -> Result<(), SanityError> {
        if self.unavailable {
            return Err(SanityError::Api {
                status: 503,
                message: "dataset unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Catalog for StubCatalog {
    async fn shipping_metadata(
        &self,
        ids: &[DocumentId],
    ) -> Result<Vec<ShippingMetadata>, SanityError> {
        self.check()?;
        Ok(self
            .shipping
            .iter()
            .filter(|m| ids.contains(&m.id))
            .cloned()
            .collect())
    }

    async fn pricing(&self, ids: &[DocumentId]) -> Result<Vec<ProductPricing>, SanityError> {
        self.check()?;
        Ok(self
            .pricing
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }
}

/// Rate provider returning canned rates and recording requests.
#[derive(Default)]
pub struct StubRates {
    pub rates: Vec<ShippingRate>,
    /// Status and message of a provider error to return instead of rates.
    pub failure: Option<(u16, String)>,
    pub requests: Mutex<Vec<RateRequest>>,
}

impl StubRates {
    /// Number of rate requests received.
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl RateProvider for StubRates {
    async fn list_carriers(&self) -> Result<Vec<Carrier>, ShipEngineError> {
        Ok(vec![Carrier {
            carrier_id: CarrierId::new("se-usps"),
            carrier_code: Some("stamps_com".to_string()),
            friendly_name: Some("USPS".to_string()),
        }])
    }

    async fn get_rates(&self, request: &RateRequest) -> Result<Vec<ShippingRate>, ShipEngineError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some((status, message)) = &self.failure {
            return Err(ShipEngineError::Api {
                status: *status,
                message: message.clone(),
            });
        }
        Ok(self.rates.clone())
    }
}

/// Payment gateway that records session requests.
#[derive(Default)]
pub struct StubPayments {
    pub requests: Mutex<Vec<CheckoutSessionRequest>>,
    pub decline: Option<String>,
}

#[async_trait]
impl PaymentGateway for StubPayments {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(message) = &self.decline {
            return Err(StripeError::Api {
                status: 400,
                message: message.clone(),
            });
        }
        Ok(CheckoutSession {
            id: "cs_test_integration".to_string(),
            url: "https://checkout.stripe.com/c/pay/cs_test_integration".to_string(),
            expires_at: None,
        })
    }
}

// =============================================================================
// Test server
// =============================================================================

/// A storefront served on an ephemeral local port.
pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub rates: Arc<StubRates>,
    pub payments: Arc<StubPayments>,
}

impl TestApp {
    /// Serve the app with the default [`test_config`].
    pub async fn spawn(catalog: StubCatalog, rates: StubRates, payments: StubPayments) -> Self {
        Self::spawn_with_config(test_config(), catalog, rates, payments).await
    }

    /// Serve the app with a custom configuration.
    pub async fn spawn_with_config(
        config: StorefrontConfig,
        catalog: StubCatalog,
        rates: StubRates,
        payments: StubPayments,
    ) -> Self {
        let rates = Arc::new(rates);
        let payments = Arc::new(payments);
        let state = AppState::with_services(
            config,
            Arc::new(catalog),
            Arc::clone(&rates) as Arc<dyn RateProvider>,
            Arc::clone(&payments) as Arc<dyn PaymentGateway>,
        );
        let app = tidewater_storefront::app(state);

        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
            rates,
            payments,
        }
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// POST a JSON body.
    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .unwrap()
    }
}
