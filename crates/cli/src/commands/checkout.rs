//! `tw-cli checkout`: walk the checkout funnel against a running storefront.
//!
//! Every step goes through [`tidewater_core::reduce`], the same state
//! machine the browser uses, so a scripted run exercises the real
//! transitions: address validation, the rate request counter, rate
//! selection and payment session creation.

use std::path::Path;

use thiserror::Error;
use tidewater_core::{
    CheckoutAction, CheckoutState, CheckoutStatus, PaymentSession, ShippingRate, reduce,
};

use super::{load_cart, load_destination};
use crate::api::ApiClient;

/// Reasons a scripted checkout stops before reaching payment.
#[derive(Debug, Error)]
pub enum FunnelError {
    /// The reducer entered the error state.
    #[error("Checkout failed while {stage}: {message}")]
    Failed { stage: &'static str, message: String },

    #[error("This order ships by freight and cannot be paid online")]
    Freight,

    #[error("No shipping rates available for this address")]
    NoRates,

    #[error("No rate matches service '{0}'")]
    UnknownService(String),
}

/// Funnel state driven through the reducer.
struct Funnel {
    state: CheckoutState,
}

impl Funnel {
    fn new() -> Self {
        Self {
            state: CheckoutState::default(),
        }
    }

    fn dispatch(&mut self, action: CheckoutAction) {
        let before = self.state.status;
        self.state = reduce(std::mem::take(&mut self.state), action);
        tracing::debug!(from = ?before, to = ?self.state.status, "Checkout transition");
    }

    /// Fail with the reducer's message if it ended up in the error state.
    fn check(&self, stage: &'static str) -> Result<(), FunnelError> {
        if self.state.status == CheckoutStatus::Error {
            return Err(FunnelError::Failed {
                stage,
                message: self.state.error.clone().unwrap_or_default(),
            });
        }
        Ok(())
    }
}

/// Pick the rate for `service` (matching service code or name,
/// case-insensitive), or the cheapest when no service is given.
fn pick_rate(state: &CheckoutState, service: Option<&str>) -> Result<ShippingRate, FunnelError> {
    let Some(wanted) = service else {
        return state.best_rate().cloned().ok_or(FunnelError::NoRates);
    };

    state
        .rates
        .iter()
        .find(|rate| {
            rate.service_code
                .as_deref()
                .is_some_and(|code| code.eq_ignore_ascii_case(wanted))
                || rate.service.eq_ignore_ascii_case(wanted)
        })
        .cloned()
        .ok_or_else(|| FunnelError::UnknownService(wanted.to_string()))
}

/// Run the funnel and print the payment URL.
///
/// # Errors
///
/// Returns error if the input files cannot be loaded, the storefront
/// rejects a step, or no usable rate is available.
pub async fn run(
    client: &ApiClient,
    cart_path: &Path,
    to_path: &Path,
    service: Option<&str>,
    email: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let items = load_cart(cart_path)?;
    let destination = load_destination(to_path)?;

    let mut funnel = Funnel::new();
    funnel.dispatch(CheckoutAction::StartCheckout);
    funnel.dispatch(CheckoutAction::UpdateAddress(destination));
    funnel.dispatch(CheckoutAction::AddressValidatedOk);
    funnel.check("validating the address")?;

    funnel.dispatch(CheckoutAction::RequestRates);
    let request = funnel.state.rates_request;
    match client.quote(&items, &funnel.state.address).await {
        Ok(quote) if quote.freight => {
            funnel.dispatch(CheckoutAction::RatesFail {
                request,
                message: FunnelError::Freight.to_string(),
            });
            return Err(FunnelError::Freight.into());
        }
        Ok(quote) => {
            if !quote.missing.is_empty() {
                tracing::warn!(missing = ?quote.missing, "Some items have no shipping data");
            }
            funnel.dispatch(CheckoutAction::RatesSuccess {
                request,
                rates: quote.rates,
            });
        }
        Err(e) => funnel.dispatch(CheckoutAction::RatesFail {
            request,
            message: e.message(),
        }),
    }
    funnel.check("loading rates")?;

    let rate = pick_rate(&funnel.state, service)?;
    tracing::info!(carrier = %rate.carrier, service = %rate.service, price = %rate.price(), "Selected rate");
    funnel.dispatch(CheckoutAction::SelectRate(rate));
    funnel.dispatch(CheckoutAction::CreatePaymentSession);

    let Some(selected) = funnel.state.selected_rate.clone() else {
        return Err(FunnelError::NoRates.into());
    };
    match client
        .checkout(&items, &funnel.state.address, &selected, email.as_deref())
        .await
    {
        Ok(session) => funnel.dispatch(CheckoutAction::PaymentSessionSuccess(PaymentSession {
            session_id: session.session_id,
            url: session.url,
        })),
        Err(e) => funnel.dispatch(CheckoutAction::PaymentSessionFail {
            message: e.message(),
        }),
    }
    funnel.check("creating the payment session")?;

    if let Some(session) = &funnel.state.payment_session {
        #[allow(clippy::print_stdout)]
        {
            println!("Payment session {}", session.session_id);
            println!("{}", session.url);
        }
    }
    Ok(())
}
