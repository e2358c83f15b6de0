//! Core types for Tidewater.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod price;
pub mod shipping;

pub use cart::{
    CartItem, CartTooLarge, MAX_CART_UNITS, OptionChoice, OptionGroup, PricedCart, PricedLine,
    PricingError, ProductPricing, cart_units, price_cart,
};
pub use id::*;
pub use price::{CurrencyCode, Price, PriceError};
pub use shipping::{
    AddressError, Destination, Dimensions, DimensionsError, FREIGHT_DIMENSION_THRESHOLD_IN,
    FREIGHT_WEIGHT_THRESHOLD_LB, FreightAssessment, LengthUnit, PackageSpec, ShippingRate, Weight,
    WeightUnit, sort_rates,
};
