//! Inbound payment notifications: signature check and event decoding.

use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;

use crate::domain::errors::DomainError;
use crate::domain::order::PaymentCompletion;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";
pub const COMPLETED_EVENT: &str = "checkout.session.completed";

/// Maximum age of a signed delivery, in seconds.
const TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

/// Checks `t=<unix>,v1=<hex>` signature headers against the shared secret.
#[derive(Debug, Clone)]
pub struct WebhookVerifier {
    secret: SecretString,
}

impl WebhookVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    pub fn verify(&self, payload: &[u8], header: &str, now: i64) -> Result<(), DomainError> {
        let mut timestamp = None;
        let mut candidates = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", v)) => timestamp = Some(v),
                Some(("v1", v)) => candidates.push(v),
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| DomainError::InvalidSignature("missing timestamp".to_string()))?;
        let ts: i64 = timestamp
            .parse()
            .map_err(|_| DomainError::InvalidSignature("invalid timestamp".to_string()))?;
        if (now - ts).abs() > TOLERANCE_SECS {
            return Err(DomainError::InvalidSignature(
                "timestamp outside tolerance".to_string(),
            ));
        }
        if candidates.is_empty() {
            return Err(DomainError::InvalidSignature("missing v1 signature".to_string()));
        }

        let mac = self.mac(timestamp, payload)?;
        let matched = candidates.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });
        if matched {
            Ok(())
        } else {
            Err(DomainError::InvalidSignature("signature mismatch".to_string()))
        }
    }

    /// Header value for `payload` signed at `timestamp`.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, DomainError> {
        let mac = self.mac(&timestamp.to_string(), payload)?;
        Ok(format!(
            "t={timestamp},v1={}",
            hex::encode(mac.finalize().into_bytes())
        ))
    }

    fn mac(&self, timestamp: &str, payload: &[u8]) -> Result<HmacSha256, DomainError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| DomainError::InvalidSignature(e.to_string()))?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    Completed(PaymentCompletion),
    /// Any event type this service does not act on.
    Other(String),
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    id: String,
    #[serde(default)]
    metadata: std::collections::HashMap<String, String>,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    customer_email: Option<String>,
    #[serde(default)]
    customer_details: Option<CustomerDetails>,
    #[serde(default)]
    created: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CustomerDetails {
    #[serde(default)]
    email: Option<String>,
}

pub fn parse_event(payload: &[u8]) -> Result<PaymentEvent, DomainError> {
    let envelope: EventEnvelope =
        serde_json::from_slice(payload).map_err(|e| DomainError::InvalidPayload(e.to_string()))?;
    if envelope.event_type != COMPLETED_EVENT {
        return Ok(PaymentEvent::Other(envelope.event_type));
    }

    let session: CheckoutSessionObject = serde_json::from_value(envelope.data.object)
        .map_err(|e| DomainError::InvalidPayload(e.to_string()))?;
    let created_at = session
        .created
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_else(Utc::now);

    Ok(PaymentEvent::Completed(PaymentCompletion {
        draft_id: session
            .metadata
            .get("draft_id")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
        amount_total_minor: session.amount_total.unwrap_or_default(),
        currency: session.currency.unwrap_or_default().to_ascii_uppercase(),
        payment_status: session.payment_status.unwrap_or_else(|| "unknown".to_string()),
        customer_email: session
            .customer_details
            .and_then(|d| d.email)
            .or(session.customer_email),
        created_at,
        session_id: session.id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(SecretString::from("whsec_test".to_string()))
    }

    #[test]
    fn signed_payload_verifies() {
        let body = br#"{"type":"ping"}"#;
        let header = verifier().sign(body, 1_700_000_000).expect("sign");
        assert!(verifier().verify(body, &header, 1_700_000_100).is_ok());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let header = verifier().sign(b"original", 1_700_000_000).expect("sign");
        let err = verifier()
            .verify(b"tampered", &header, 1_700_000_000)
            .expect_err("mismatch");
        assert!(matches!(err, DomainError::InvalidSignature(_)));
    }

    #[test]
    fn old_timestamp_is_rejected() {
        let header = verifier().sign(b"body", 1_700_000_000).expect("sign");
        assert!(verifier().verify(b"body", &header, 1_700_000_301).is_err());
    }

    #[test]
    fn any_matching_v1_entry_is_accepted() {
        let signed = verifier().sign(b"body", 1_700_000_000).expect("sign");
        let header = format!("{signed},v1=deadbeef");
        assert!(verifier().verify(b"body", &header, 1_700_000_000).is_ok());
        let header = signed.replace("v1=", "v0=");
        assert!(verifier().verify(b"body", &header, 1_700_000_000).is_err());
    }

    #[test]
    fn garbage_header_is_rejected() {
        for header in ["", "nonsense", "t=abc,v1=00", "v1=00"] {
            assert!(verifier().verify(b"body", header, 0).is_err(), "{header}");
        }
    }

    #[test]
    fn completed_session_is_decoded() {
        let body = br#"{
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {
                "id": "cs_test_1",
                "metadata": {"draft_id": "5b0c1c84-5a0e-4c1c-9d59-3f4b1f8a2a10"},
                "amount_total": 3499,
                "currency": "usd",
                "payment_status": "paid",
                "customer_details": {"email": "ada@example.com"},
                "created": 1700000000
            }}
        }"#;
        let PaymentEvent::Completed(c) = parse_event(body).expect("parse") else {
            panic!("expected completion");
        };
        assert_eq!(c.session_id, "cs_test_1");
        assert_eq!(c.amount_total_minor, 3499);
        assert_eq!(c.currency, "USD");
        assert_eq!(c.customer_email.as_deref(), Some("ada@example.com"));
        assert_eq!(c.created_at.timestamp(), 1_700_000_000);
        assert!(c.draft_id.is_some());
    }

    #[test]
    fn other_event_types_pass_through() {
        let body = br#"{"type":"charge.refunded","data":{"object":{}}}"#;
        assert_eq!(
            parse_event(body).expect("parse"),
            PaymentEvent::Other("charge.refunded".to_string())
        );
    }

    #[test]
    fn blank_draft_id_is_treated_as_absent() {
        let body = br#"{"type":"checkout.session.completed","data":{"object":{"id":"cs_2","metadata":{"draft_id":" "}}}}"#;
        let PaymentEvent::Completed(c) = parse_event(body).expect("parse") else {
            panic!("expected completion");
        };
        assert!(c.draft_id.is_none());
    }

    #[test]
    fn malformed_json_is_invalid_payload() {
        assert!(matches!(
            parse_event(b"{not json"),
            Err(DomainError::InvalidPayload(_))
        ));
    }
}
