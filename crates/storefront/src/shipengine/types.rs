//! ShipEngine wire types.
//!
//! Rate payloads are parsed leniently: both ShipEngine's
//! `shipping_amount`/`service_type` shape and the flat EasyPost shape
//! (`rate`, `carrier`, `service`) are accepted and normalized by
//! [`RawRate::normalize`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tidewater_core::{
    CarrierId, CurrencyCode, Destination, Dimensions, PackageSpec, RateId, ShippingRate, Weight,
};

use crate::services::{Carrier, RateRequest};

// =============================================================================
// Request
// =============================================================================

#[derive(Debug, Serialize)]
pub struct RatesBody<'a> {
    pub rate_options: RateOptions<'a>,
    pub shipment: Shipment<'a>,
}

#[derive(Debug, Serialize)]
pub struct RateOptions<'a> {
    pub carrier_ids: &'a [CarrierId],
}

#[derive(Debug, Serialize)]
pub struct Shipment<'a> {
    pub ship_from: Address<'a>,
    pub ship_to: Address<'a>,
    pub packages: Vec<Package>,
}

#[derive(Debug, Serialize)]
pub struct Address<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<&'a str>,
    pub address_line1: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<&'a str>,
    pub city_locality: &'a str,
    pub state_province: &'a str,
    pub postal_code: &'a str,
    pub country_code: &'a str,
    pub address_residential_indicator: &'static str,
}

impl<'a> From<&'a Destination> for Address<'a> {
    fn from(address: &'a Destination) -> Self {
        Self {
            // ShipEngine rejects an address without a name; fall back to a placeholder.
            name: Some(address.name.as_deref().unwrap_or("Customer")),
            phone: address.phone.as_deref(),
            address_line1: &address.address_line1,
            address_line2: address.address_line2.as_deref(),
            city_locality: &address.city,
            state_province: &address.state,
            postal_code: &address.postal_code,
            country_code: &address.country,
            address_residential_indicator: "unknown",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Package {
    pub weight: Weight,
    pub dimensions: Dimensions,
}

impl From<&PackageSpec> for Package {
    fn from(package: &PackageSpec) -> Self {
        Self {
            weight: package.weight,
            dimensions: package.dimensions,
        }
    }
}

impl<'a> RatesBody<'a> {
    pub fn new(request: &'a RateRequest) -> Self {
        Self {
            rate_options: RateOptions {
                carrier_ids: &request.carrier_ids,
            },
            shipment: Shipment {
                ship_from: Address::from(&request.ship_from),
                ship_to: Address::from(&request.ship_to),
                packages: request.packages.iter().map(Package::from).collect(),
            },
        }
    }
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RatesResponse {
    pub rate_response: RateResponse,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RateResponse {
    pub rates: Vec<RawRate>,
    pub errors: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
pub struct CarriersResponse {
    #[serde(default)]
    pub carriers: Vec<RawCarrier>,
}

#[derive(Debug, Deserialize)]
pub struct RawCarrier {
    pub carrier_id: String,
    #[serde(default)]
    pub carrier_code: Option<String>,
    #[serde(default)]
    pub friendly_name: Option<String>,
}

impl From<RawCarrier> for Carrier {
    fn from(raw: RawCarrier) -> Self {
        Self {
            carrier_id: CarrierId::new(raw.carrier_id),
            carrier_code: raw.carrier_code,
            friendly_name: raw.friendly_name,
        }
    }
}

/// Error body of a non-2xx response.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ErrorResponse {
    pub errors: Vec<ApiMessage>,
    pub message: Option<String>,
}

impl ErrorResponse {
    /// All messages joined, or `None` if the body carried none.
    pub fn joined(self) -> Option<String> {
        let messages: Vec<String> = self
            .errors
            .into_iter()
            .filter_map(|e| e.message)
            .chain(self.message)
            .filter(|m| !m.trim().is_empty())
            .collect();
        (!messages.is_empty()).then(|| messages.join("; "))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiMessage {
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Money {
    pub currency: String,
    pub amount: Decimal,
}

/// A rate as either provider returns it.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawRate {
    // ShipEngine
    pub rate_id: Option<String>,
    pub carrier_id: Option<String>,
    pub carrier_code: Option<String>,
    pub carrier_friendly_name: Option<String>,
    pub service_type: Option<String>,
    pub service_code: Option<String>,
    pub shipping_amount: Option<Money>,
    pub insurance_amount: Option<Money>,
    pub confirmation_amount: Option<Money>,
    pub other_amount: Option<Money>,
    pub delivery_days: Option<u32>,
    pub estimated_delivery_date: Option<String>,
    // EasyPost
    pub id: Option<String>,
    pub carrier: Option<String>,
    pub service: Option<String>,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub rate: Option<Decimal>,
    pub currency: Option<String>,
}

impl RawRate {
    /// Normalize into a [`ShippingRate`].
    ///
    /// Returns `None` for rates with no amount, no carrier or an unsupported
    /// currency.
    pub fn normalize(self) -> Option<ShippingRate> {
        let (amount, currency) = self.total()?;
        let currency = match currency.parse::<CurrencyCode>() {
            Ok(code) => code,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping rate in unsupported currency");
                return None;
            }
        };

        let carrier = self
            .carrier_friendly_name
            .or(self.carrier)
            .or_else(|| self.carrier_code.clone())
            .or_else(|| self.carrier_id.clone())?;
        let service = self
            .service_type
            .or(self.service)
            .or_else(|| self.service_code.clone())
            .unwrap_or_else(|| "Standard".to_string());

        Some(ShippingRate {
            rate_id: self.rate_id.or(self.id).map(RateId::new),
            carrier,
            carrier_id: self.carrier_id.map(CarrierId::new),
            service,
            service_code: self.service_code,
            amount,
            currency,
            delivery_days: self.delivery_days,
            estimated_delivery_date: self.estimated_delivery_date,
        })
    }

    /// Amount due for the rate and its currency.
    ///
    /// ShipEngine splits the price into shipping plus surcharges; the
    /// surcharges are added when they share the shipping currency. A sum
    /// that overflows yields `None`.
    fn total(&self) -> Option<(Decimal, String)> {
        if let Some(shipping) = &self.shipping_amount {
            let total = [
                &self.insurance_amount,
                &self.confirmation_amount,
                &self.other_amount,
            ]
            .into_iter()
            .flatten()
            .filter(|m| m.currency.eq_ignore_ascii_case(&shipping.currency))
            .try_fold(shipping.amount, |sum, m| sum.checked_add(m.amount))?;
            return Some((total, shipping.currency.clone()));
        }

        let rate = self.rate?;
        Some((rate, self.currency.clone().unwrap_or_else(|| "USD".to_string())))
    }
}
