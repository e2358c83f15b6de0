//! Checkout funnel state machine.
//!
//! [`reduce`] is a pure transition function: it takes the current
//! [`CheckoutState`] and an action and returns the next state. Drivers perform
//! the I/O (rate lookup, payment session creation) between actions and feed
//! the outcome back in as another action.
//!
//! ```text
//! IDLE ─START_CHECKOUT─▶ CART_READY ─UPDATE_ADDRESS─▶ CHECKOUT_ADDRESS_REQUIRED
//!   ─ADDRESS_VALIDATED_OK─▶ ADDRESS_VALID ─REQUEST_RATES─▶ RATES_LOADING
//!   ─RATES_SUCCESS─▶ RATES_READY ─SELECT_RATE─▶ RATE_SELECTED
//!   ─CREATE_PAYMENT_SESSION─▶ PAYMENT_CREATING ─PAYMENT_SESSION_SUCCESS─▶ PAYMENT_REDIRECTING
//! ```
//!
//! Failures move to `ERROR` and remember where to resume; `RESET_ERROR` goes
//! back there with the address and rates intact. Any action not valid for the
//! current status leaves the state untouched.
//!
//! Every `REQUEST_RATES` bumps a request number. Rate results carry the number
//! they answer, and results for anything but the latest request are dropped,
//! so a slow response for an old address can never overwrite a newer one.

use serde::{Deserialize, Serialize};

use crate::types::{Destination, ShippingRate, sort_rates};

/// Position in the checkout funnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutStatus {
    #[default]
    Idle,
    CartReady,
    #[serde(rename = "CHECKOUT_ADDRESS_REQUIRED")]
    AddressRequired,
    AddressValid,
    RatesLoading,
    RatesReady,
    RateSelected,
    PaymentCreating,
    PaymentRedirecting,
    Error,
}

impl CheckoutStatus {
    /// Whether the shopper may edit the shipping address in this status.
    #[must_use]
    pub const fn accepts_address(self) -> bool {
        matches!(
            self,
            Self::CartReady
                | Self::AddressRequired
                | Self::AddressValid
                | Self::RatesLoading
                | Self::RatesReady
                | Self::RateSelected
        )
    }

    /// Whether rates may be (re)requested in this status.
    #[must_use]
    pub const fn accepts_rate_request(self) -> bool {
        matches!(
            self,
            Self::AddressValid | Self::RatesReady | Self::RateSelected
        )
    }
}

/// A created payment session the shopper is redirected to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSession {
    pub session_id: String,
    pub url: String,
}

/// Reducer value for one shopper's checkout.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutState {
    pub status: CheckoutStatus,
    pub address: Destination,
    /// Sorted ascending by amount; replaced wholesale, never edited in place.
    pub rates: Vec<ShippingRate>,
    /// Always a member of `rates` when set.
    pub selected_rate: Option<ShippingRate>,
    pub error: Option<String>,
    /// Status `RESET_ERROR` returns to.
    pub resume_status: Option<CheckoutStatus>,
    /// Number of the latest rate request.
    pub rates_request: u64,
    pub payment_session: Option<PaymentSession>,
}

impl CheckoutState {
    /// The cheapest rate, if any were returned.
    #[must_use]
    pub fn best_rate(&self) -> Option<&ShippingRate> {
        self.rates.first()
    }

    fn fail(mut self, message: String, resume: CheckoutStatus) -> Self {
        self.status = CheckoutStatus::Error;
        self.error = Some(message);
        self.resume_status = Some(resume);
        self
    }
}

/// Events driving the checkout funnel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE"
)]
pub enum CheckoutAction {
    StartCheckout,
    UpdateAddress(Destination),
    AddressValidatedOk,
    AddressValidatedFail { message: String },
    RequestRates,
    RatesSuccess {
        request: u64,
        rates: Vec<ShippingRate>,
    },
    RatesFail { request: u64, message: String },
    SelectRate(ShippingRate),
    CreatePaymentSession,
    PaymentSessionSuccess(PaymentSession),
    PaymentSessionFail { message: String },
    ResetError,
    Reset,
}

/// Apply one action to the checkout state.
#[must_use]
pub fn reduce(state: CheckoutState, action: CheckoutAction) -> CheckoutState {
    use CheckoutAction as A;
    use CheckoutStatus as S;

    let mut next = state;
    match (next.status, action) {
        (S::Idle, A::StartCheckout) => {
            next.status = S::CartReady;
            next
        }

        (status, A::UpdateAddress(address)) if status.accepts_address() => {
            next.address = address;
            next.rates = Vec::new();
            next.selected_rate = None;
            next.status = S::AddressRequired;
            next
        }

        (S::AddressRequired, A::AddressValidatedOk) => match next.address.validate() {
            Ok(()) => {
                next.status = S::AddressValid;
                next
            }
            Err(err) => next.fail(err.to_string(), S::AddressRequired),
        },

        (S::AddressRequired, A::AddressValidatedFail { message }) => {
            next.fail(message, S::AddressRequired)
        }

        (status, A::RequestRates) if status.accepts_rate_request() => {
            next.rates_request += 1;
            next.rates = Vec::new();
            next.selected_rate = None;
            next.error = None;
            next.status = S::RatesLoading;
            next
        }

        (S::RatesLoading, A::RatesSuccess { request, rates }) if request == next.rates_request => {
            next.rates = sort_rates(rates);
            next.status = S::RatesReady;
            next
        }

        (S::RatesLoading, A::RatesFail { request, message }) if request == next.rates_request => {
            next.fail(message, S::AddressValid)
        }

        (S::RatesReady | S::RateSelected, A::SelectRate(rate)) => {
            if let Some(member) = next.rates.iter().find(|r| **r == rate).cloned() {
                next.selected_rate = Some(member);
                next.status = S::RateSelected;
            }
            next
        }

        (S::RateSelected, A::CreatePaymentSession) => {
            next.status = S::PaymentCreating;
            next
        }

        (S::PaymentCreating, A::PaymentSessionSuccess(session)) => {
            next.payment_session = Some(session);
            next.status = S::PaymentRedirecting;
            next
        }

        (S::PaymentCreating, A::PaymentSessionFail { message }) => {
            next.fail(message, S::RateSelected)
        }

        (S::Error, A::ResetError) => {
            next.status = next.resume_status.take().unwrap_or(S::CartReady);
            next.error = None;
            next
        }

        (_, A::Reset) => CheckoutState::default(),

        _ => next,
    }
}
