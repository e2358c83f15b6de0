//! Stripe webhook handler.
//!
//! Payment completion is recorded in logs and Sentry breadcrumbs only;
//! fulfilment happens in Stripe's dashboard. Unknown event types are
//! acknowledged so Stripe stops retrying them.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tracing::instrument;

use crate::error::Result;
use crate::state::AppState;
use crate::stripe::{WebhookError, WebhookEvent, verify_signature};

const SIGNATURE_HEADER: &str = "stripe-signature";

/// Receive a Stripe event.
#[instrument(skip_all)]
pub async fn stripe(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let secret = state
        .config()
        .stripe
        .webhook_secret
        .as_ref()
        .ok_or(WebhookError::NotConfigured)?;
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;

    verify_signature(
        secret.expose_secret(),
        signature,
        &body,
        Utc::now().timestamp(),
    )?;
    let event = WebhookEvent::parse(&body)?;

    let object = &event.data.object;
    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let (payment_status, amount_total) = payment_summary(object);
            tracing::info!(
                event_id = %event.id,
                session_id = event.object_id().unwrap_or_default(),
                payment_status,
                amount_total,
                "Checkout session completed"
            );
        }
        "checkout.session.expired" => {
            tracing::info!(
                event_id = %event.id,
                session_id = event.object_id().unwrap_or_default(),
                "Checkout session expired"
            );
        }
        other => {
            tracing::debug!(event_id = %event.id, event_type = other, "Ignoring Stripe event");
        }
    }

    Ok(Json(json!({ "received": true })))
}

/// Payment status and total (minor units) of a checkout session object.
fn payment_summary(object: &Value) -> (&str, i64) {
    let status = object
        .get("payment_status")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let total = object
        .get("amount_total")
        .and_then(Value::as_i64)
        .unwrap_or_default();
    (status, total)
}
