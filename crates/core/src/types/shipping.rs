//! Shipping measurements, packages, destinations and normalized rates.
//!
//! Units follow the carrier-rate API's vocabulary (`pound`, `ounce`, `inch`,
//! ...) so packages serialize straight into a rate request.

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::{CarrierId, RateId};
use super::price::{CurrencyCode, Price};

/// Total shipment weight at or above which a shipment goes freight.
pub const FREIGHT_WEIGHT_THRESHOLD_LB: f64 = 150.0;

/// Any single package side at or above this length forces freight.
pub const FREIGHT_DIMENSION_THRESHOLD_IN: f64 = 60.0;

const POUNDS_PER_KILOGRAM: f64 = 2.204_622_621_8;
const CENTIMETERS_PER_INCH: f64 = 2.54;

// =============================================================================
// Weight
// =============================================================================

/// Weight unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    #[default]
    Pound,
    Ounce,
    Gram,
    Kilogram,
}

/// A weight with its unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weight {
    pub value: f64,
    pub unit: WeightUnit,
}

impl Weight {
    /// A weight in pounds.
    #[must_use]
    pub const fn pounds(value: f64) -> Self {
        Self {
            value,
            unit: WeightUnit::Pound,
        }
    }

    /// The weight converted to pounds.
    #[must_use]
    pub fn in_pounds(&self) -> f64 {
        match self.unit {
            WeightUnit::Pound => self.value,
            WeightUnit::Ounce => self.value / 16.0,
            WeightUnit::Gram => self.value / 1000.0 * POUNDS_PER_KILOGRAM,
            WeightUnit::Kilogram => self.value * POUNDS_PER_KILOGRAM,
        }
    }
}

// =============================================================================
// Dimensions
// =============================================================================

/// Length unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    #[default]
    Inch,
    Centimeter,
}

impl LengthUnit {
    const fn suffix(self) -> &'static str {
        match self {
            Self::Inch => "in",
            Self::Centimeter => "cm",
        }
    }
}

/// Errors from parsing a box-dimensions string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DimensionsError {
    /// Not of the form `LxWxH`.
    #[error("expected dimensions like \"10x8x4\", got \"{0}\"")]
    Malformed(String),
    /// A side is zero, negative or not finite.
    #[error("dimensions must be positive, got \"{0}\"")]
    NonPositive(String),
}

/// Box dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub unit: LengthUnit,
}

impl Dimensions {
    /// Dimensions in inches.
    #[must_use]
    pub const fn inches(length: f64, width: f64, height: f64) -> Self {
        Self {
            length,
            width,
            height,
            unit: LengthUnit::Inch,
        }
    }

    /// Longest side converted to inches.
    #[must_use]
    pub fn max_side_in(&self) -> f64 {
        let longest = self.length.max(self.width).max(self.height);
        match self.unit {
            LengthUnit::Inch => longest,
            LengthUnit::Centimeter => longest / CENTIMETERS_PER_INCH,
        }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}x{}{}",
            self.length,
            self.width,
            self.height,
            self.unit.suffix()
        )
    }
}

impl FromStr for Dimensions {
    type Err = DimensionsError;

    /// Parse `"10x8x4"`, `"10 X 8 X 4 in"` or `"25x20x10cm"`. Inches when no
    /// unit suffix is given.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let (body, unit) = if let Some(body) = lower.strip_suffix("cm") {
            (body, LengthUnit::Centimeter)
        } else if let Some(body) = lower.strip_suffix("in") {
            (body, LengthUnit::Inch)
        } else if let Some(body) = lower.strip_suffix('"') {
            (body, LengthUnit::Inch)
        } else {
            (lower.as_str(), LengthUnit::Inch)
        };

        let sides = body
            .split('x')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| DimensionsError::Malformed(s.to_string()))?;

        let &[length, width, height] = sides.as_slice() else {
            return Err(DimensionsError::Malformed(s.to_string()));
        };

        if [length, width, height]
            .iter()
            .any(|side| !side.is_finite() || *side <= 0.0)
        {
            return Err(DimensionsError::NonPositive(s.to_string()));
        }

        Ok(Self {
            length,
            width,
            height,
            unit,
        })
    }
}

// =============================================================================
// Packages
// =============================================================================

/// One physical parcel in a shipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageSpec {
    pub weight: Weight,
    pub dimensions: Dimensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Item must not share a box with anything else.
    #[serde(default)]
    pub ships_alone: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_class: Option<String>,
}

/// Aggregate size of a shipment and whether it exceeds parcel limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreightAssessment {
    pub total_weight_lb: f64,
    pub max_dimension_in: f64,
    pub freight: bool,
}

impl FreightAssessment {
    /// Sum weights and find the longest side across all packages.
    #[must_use]
    pub fn assess(packages: &[PackageSpec]) -> Self {
        let total_weight_lb = packages.iter().map(|p| p.weight.in_pounds()).sum::<f64>();
        let max_dimension_in = packages
            .iter()
            .map(|p| p.dimensions.max_side_in())
            .fold(0.0_f64, f64::max);

        Self {
            total_weight_lb,
            max_dimension_in,
            freight: total_weight_lb >= FREIGHT_WEIGHT_THRESHOLD_LB
                || max_dimension_in >= FREIGHT_DIMENSION_THRESHOLD_IN,
        }
    }
}

// =============================================================================
// Destination
// =============================================================================

/// Address validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// One or more required fields are blank.
    #[error("Missing required address fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
}

/// Postal address a shipment is quoted to.
///
/// Every field defaults to empty so that a partially filled form still
/// deserializes and [`Destination::validate`] can name what is missing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Destination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub address_line1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl Destination {
    /// Names (wire spelling) of required fields that are blank.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("addressLine1", &self.address_line1),
            ("city", &self.city),
            ("state", &self.state),
            ("postalCode", &self.postal_code),
            ("country", &self.country),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// Check that every required field is present.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::MissingFields` listing the blank fields.
    pub fn validate(&self) -> Result<(), AddressError> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AddressError::MissingFields(missing))
        }
    }
}

// =============================================================================
// Rates
// =============================================================================

/// A priced shipping option, normalized across rate providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingRate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_id: Option<RateId>,
    pub carrier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrier_id: Option<CarrierId>,
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_code: Option<String>,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    #[serde(default)]
    pub delivery_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_delivery_date: Option<String>,
}

impl ShippingRate {
    /// The rate's amount as a [`Price`].
    #[must_use]
    pub const fn price(&self) -> Price {
        Price::new(self.amount, self.currency)
    }
}

/// Sort rates ascending by amount. Equal amounts keep their input order.
#[must_use]
pub fn sort_rates(mut rates: Vec<ShippingRate>) -> Vec<ShippingRate> {
    rates.sort_by(|a, b| a.amount.cmp(&b.amount));
    rates
}
