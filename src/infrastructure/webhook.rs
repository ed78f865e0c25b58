//! Billing webhook verification.
//!
//! The payment provider signs the raw request body with HMAC-SHA256 using the
//! shared secret and sends the hex digest in the `X-Signature` header.

use crate::domain::parse_tier;
use crate::domain::SubscriptionTier;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum WebhookError {
    #[error("Webhook secret is not configured")]
    NotConfigured,
    #[error("Invalid webhook signature")]
    InvalidSignature,
    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),
    #[error("Invalid tier: {0}")]
    InvalidTier(String),
}

/// Subscription event sent by the payment provider.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BillingEvent {
    pub external_id: String,
    pub tier: String,
}

/// A verified, parsed tier change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierChange {
    pub external_id: String,
    pub tier: SubscriptionTier,
}

pub fn sign_payload(secret: &str, body: &[u8]) -> Result<String, WebhookError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::NotConfigured)?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> Result<(), WebhookError> {
    if secret.is_empty() {
        return Err(WebhookError::NotConfigured);
    }

    let provided = hex::decode(signature.trim()).map_err(|_| WebhookError::InvalidSignature)?;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::NotConfigured)?;
    mac.update(body);
    mac.verify_slice(&provided)
        .map_err(|_| WebhookError::InvalidSignature)
}

/// Verify and decode a billing webhook body.
pub fn parse_billing_event(
    secret: &str,
    body: &[u8],
    signature: &str,
) -> Result<TierChange, WebhookError> {
    verify_signature(secret, body, signature)?;

    let event: BillingEvent = serde_json::from_slice(body)
        .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;
    let tier = parse_tier(&event.tier).ok_or(WebhookError::InvalidTier(event.tier.clone()))?;

    Ok(TierChange {
        external_id: event.external_id,
        tier,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    #[test]
    fn signed_event_is_accepted() {
        let body = br#"{"external_id":"user-9","tier":"pro"}"#;
        let signature = sign_payload(SECRET, body).unwrap();

        let change = parse_billing_event(SECRET, body, &signature).unwrap();
        assert_eq!(change.external_id, "user-9");
        assert_eq!(change.tier, SubscriptionTier::Pro);
    }

    #[test]
    fn tampered_body_is_rejected() {
        let signature = sign_payload(SECRET, br#"{"external_id":"a","tier":"free"}"#).unwrap();
        let result = parse_billing_event(SECRET, br#"{"external_id":"a","tier":"plus"}"#, &signature);
        assert_eq!(result, Err(WebhookError::InvalidSignature));
    }

    #[test]
    fn non_hex_signature_is_rejected() {
        assert_eq!(
            verify_signature(SECRET, b"{}", "not-hex"),
            Err(WebhookError::InvalidSignature)
        );
    }

    #[test]
    fn empty_secret_is_not_configured() {
        assert_eq!(
            verify_signature("", b"{}", "00"),
            Err(WebhookError::NotConfigured)
        );
    }

    #[test]
    fn unknown_tier_is_rejected_after_verification() {
        let body = br#"{"external_id":"a","tier":"gold"}"#;
        let signature = sign_payload(SECRET, body).unwrap();
        assert_eq!(
            parse_billing_event(SECRET, body, &signature),
            Err(WebhookError::InvalidTier("gold".to_string()))
        );
    }
}
