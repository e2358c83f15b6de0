//! Tidewater Core - Shared types and pure checkout logic.
//!
//! This crate provides the types used across all Tidewater components:
//! - `storefront` - HTTP service for shipping quotes and payment sessions
//! - `cli` - Command-line client that walks the checkout funnel
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. The checkout reducer lives here so that any driver (browser,
//! CLI, tests) steps through the same transitions.
//!
//! # Modules
//!
//! - [`types`] - IDs, prices, shipping measurements, destinations, rates, cart pricing
//! - [`checkout`] - The checkout funnel state machine

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod checkout;
pub mod types;

pub use checkout::{CheckoutAction, CheckoutState, CheckoutStatus, PaymentSession, reduce};
pub use types::*;
