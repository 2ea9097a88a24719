//! Stripe Webhook Handling
//!
//! Signature verification and parsing of the payment events the portal
//! reacts to.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed payload, in seconds
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Parsed webhook event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    /// Invoice paid - record the payment against the student
    InvoicePaid {
        invoice_id: String,
        student_id: Option<String>,
        student_name: Option<String>,
        /// Minor units
        amount_paid: i64,
        currency: String,
        payment_intent_id: Option<String>,
    },

    /// Invoice payment failed
    InvoicePaymentFailed {
        invoice_id: String,
        customer_email: Option<String>,
    },

    /// Card payment succeeded
    PaymentSucceeded {
        payment_intent_id: String,
        student_id: Option<String>,
        amount: i64,
        currency: String,
    },

    /// Card payment failed
    PaymentFailed {
        payment_intent_id: String,
        reason: Option<String>,
    },

    /// Unhandled event type
    Other { event_type: String },
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    type_: String,
    data: RawEventData,
}

#[derive(Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

#[derive(Deserialize)]
struct RawInvoice {
    id: String,
    #[serde(default)]
    amount_paid: i64,
    #[serde(default)]
    currency: String,
    #[serde(default)]
    customer_email: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
    /// Either an id or an expanded object
    #[serde(default)]
    payment_intent: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawPaymentIntent {
    id: String,
    #[serde(default)]
    amount: i64,
    #[serde(default)]
    currency: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
    #[serde(default)]
    last_payment_error: Option<RawPaymentError>,
}

#[derive(Deserialize)]
struct RawPaymentError {
    #[serde(default)]
    message: Option<String>,
}

/// Verify a `Stripe-Signature` header against the raw payload
///
/// The header carries `t=<unix ts>` and one or more `v1=<hex hmac>` entries;
/// any matching `v1` is accepted.
pub fn verify_signature(
    payload: &str,
    signature_header: &str,
    secret: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in signature_header.split(',') {
        if let Some(rest) = part.trim().strip_prefix("t=") {
            timestamp = Some(rest);
        } else if let Some(rest) = part.trim().strip_prefix("v1=") {
            signatures.push(rest);
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| PaymentError::WebhookSignature("missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(PaymentError::WebhookSignature("missing v1 signature".into()));
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| PaymentError::WebhookSignature("invalid timestamp".into()))?;
    if now.timestamp().abs_diff(ts) > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(PaymentError::WebhookSignature("timestamp outside tolerance".into()));
    }

    for signature in signatures {
        let Ok(provided) = hex::decode(signature) else {
            continue;
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| PaymentError::Config(e.to_string()))?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        if mac.verify_slice(&provided).is_ok() {
            return Ok(());
        }
    }

    Err(PaymentError::WebhookSignature("no matching signature".into()))
}

/// Parse a verified payload into our event type
pub fn parse_event(payload: &str) -> Result<WebhookEvent> {
    let event: RawEvent =
        serde_json::from_str(payload).map_err(|e| PaymentError::WebhookParse(e.to_string()))?;

    let object = event.data.object;
    let parsed = match event.type_.as_str() {
        "invoice.paid" => {
            let invoice: RawInvoice = from_object(object, "invoice")?;
            let payment_intent_id = invoice.payment_intent.and_then(|pi| match pi {
                serde_json::Value::String(id) => Some(id),
                serde_json::Value::Object(obj) => {
                    obj.get("id").and_then(|v| v.as_str()).map(str::to_string)
                }
                _ => None,
            });
            WebhookEvent::InvoicePaid {
                invoice_id: invoice.id,
                student_id: invoice.metadata.get("student_id").cloned(),
                student_name: invoice.metadata.get("student_name").cloned(),
                amount_paid: invoice.amount_paid,
                currency: invoice.currency,
                payment_intent_id,
            }
        }
        "invoice.payment_failed" => {
            let invoice: RawInvoice = from_object(object, "invoice")?;
            WebhookEvent::InvoicePaymentFailed {
                invoice_id: invoice.id,
                customer_email: invoice.customer_email,
            }
        }
        "payment_intent.succeeded" => {
            let intent: RawPaymentIntent = from_object(object, "payment intent")?;
            WebhookEvent::PaymentSucceeded {
                payment_intent_id: intent.id,
                student_id: intent.metadata.get("student_id").cloned(),
                amount: intent.amount,
                currency: intent.currency,
            }
        }
        "payment_intent.payment_failed" => {
            let intent: RawPaymentIntent = from_object(object, "payment intent")?;
            WebhookEvent::PaymentFailed {
                payment_intent_id: intent.id,
                reason: intent.last_payment_error.and_then(|e| e.message),
            }
        }
        other => WebhookEvent::Other {
            event_type: other.to_string(),
        },
    };

    Ok(parsed)
}

fn from_object<T: serde::de::DeserializeOwned>(object: serde_json::Value, kind: &str) -> Result<T> {
    serde_json::from_value(object)
        .map_err(|e| PaymentError::WebhookParse(format!("Invalid {kind} data: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    fn sign(payload: &str, ts: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{ts}.{payload}").as_bytes());
        format!("t={ts},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_valid_signature() {
        let now = Utc::now();
        let payload = r#"{"type":"ping","data":{"object":{}}}"#;
        let header = sign(payload, now.timestamp());
        assert!(verify_signature(payload, &header, SECRET, now).is_ok());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let now = Utc::now();
        let header = sign(r#"{"amount":1}"#, now.timestamp());
        let err = verify_signature(r#"{"amount":2}"#, &header, SECRET, now).unwrap_err();
        assert!(matches!(err, PaymentError::WebhookSignature(_)));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let now = Utc::now();
        let payload = "{}";
        let header = sign(payload, now.timestamp() - SIGNATURE_TOLERANCE_SECS - 1);
        assert!(verify_signature(payload, &header, SECRET, now).is_err());
    }

    #[test]
    fn test_malformed_header_rejected() {
        let now = Utc::now();
        assert!(verify_signature("{}", "garbage", SECRET, now).is_err());
        assert!(verify_signature("{}", "t=123", SECRET, now).is_err());
    }

    #[test]
    fn test_extreme_timestamps_rejected() {
        let now = Utc::now();
        for ts in [i64::MIN, i64::MAX] {
            let err = verify_signature("{}", &format!("t={ts},v1=00"), SECRET, now).unwrap_err();
            assert!(matches!(err, PaymentError::WebhookSignature(_)));
        }
        let err =
            verify_signature("{}", "t=-9223372036854775808,v1=00", SECRET, now).unwrap_err();
        assert!(err.to_string().contains("tolerance"));
    }

    #[test]
    fn test_parse_invoice_paid() {
        let payload = r#"{
            "id": "evt_1",
            "type": "invoice.paid",
            "data": {"object": {
                "id": "in_123",
                "amount_paid": 50000,
                "currency": "usd",
                "payment_intent": "pi_456",
                "metadata": {"student_id": "S-1001", "student_name": "Ada Student"}
            }}
        }"#;

        assert_eq!(
            parse_event(payload).unwrap(),
            WebhookEvent::InvoicePaid {
                invoice_id: "in_123".into(),
                student_id: Some("S-1001".into()),
                student_name: Some("Ada Student".into()),
                amount_paid: 50000,
                currency: "usd".into(),
                payment_intent_id: Some("pi_456".into()),
            }
        );
    }

    #[test]
    fn test_parse_payment_failed() {
        let payload = r#"{"type":"payment_intent.payment_failed","data":{"object":{
            "id":"pi_9","amount":100,"currency":"usd",
            "last_payment_error":{"message":"Your card was declined."}}}}"#;

        assert_eq!(
            parse_event(payload).unwrap(),
            WebhookEvent::PaymentFailed {
                payment_intent_id: "pi_9".into(),
                reason: Some("Your card was declined.".into()),
            }
        );
    }

    #[test]
    fn test_unhandled_event_type() {
        let payload = r#"{"type":"customer.created","data":{"object":{"id":"cus_1"}}}"#;
        assert_eq!(
            parse_event(payload).unwrap(),
            WebhookEvent::Other { event_type: "customer.created".into() }
        );
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(parse_event("not json"), Err(PaymentError::WebhookParse(_))));
    }
}
