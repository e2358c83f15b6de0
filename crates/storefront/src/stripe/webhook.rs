//! Stripe webhook signature verification and event parsing.
//!
//! The `Stripe-Signature` header looks like
//! `t=1492774577,v1=5257a869...,v0=6ffbb59b...`. The signed payload is
//! `"{t}.{raw body}"` under HMAC-SHA256 with the endpoint's signing secret.
//! Any matching `v1` entry is accepted.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed timestamp, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Webhook rejection reasons.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Webhook signing secret is not configured")]
    NotConfigured,

    #[error("Missing Stripe-Signature header")]
    MissingSignature,

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

/// A Stripe event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl WebhookEvent {
    /// Parse an event from a verified body.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::InvalidPayload` if the body is not an event.
    pub fn parse(payload: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(payload).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
    }

    /// ID of the object the event is about.
    #[must_use]
    pub fn object_id(&self) -> Option<&str> {
        self.data.object.get("id").and_then(serde_json::Value::as_str)
    }
}

/// Verify a `Stripe-Signature` header against the raw request body.
///
/// `now` is the current Unix time in seconds.
///
/// # Errors
///
/// Returns `WebhookError::InvalidSignature` if the header is malformed, the
/// timestamp is outside the tolerance, or no `v1` signature matches.
pub fn verify_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    now: i64,
) -> Result<(), WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| WebhookError::InvalidSignature("missing timestamp".to_string()))?;
    let signed_at: i64 = timestamp
        .parse()
        .map_err(|_| WebhookError::InvalidSignature("invalid timestamp".to_string()))?;
    if now.abs_diff(signed_at) > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(WebhookError::InvalidSignature(
            "timestamp outside tolerance".to_string(),
        ));
    }
    if signatures.is_empty() {
        return Err(WebhookError::InvalidSignature(
            "no v1 signature".to_string(),
        ));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| WebhookError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = signatures.iter().any(|candidate| {
        hex::decode(candidate).is_ok_and(|bytes| mac.clone().verify_slice(&bytes).is_ok())
    });
    if !matched {
        return Err(WebhookError::InvalidSignature(
            "signature mismatch".to_string(),
        ));
    }

    tracing::debug!("Stripe signature verified");
    Ok(())
}
