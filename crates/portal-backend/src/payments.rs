//! Payment Records
//!
//! Completed payments are stored by the student API (`save_payment`) and read
//! back per student (`get_payments`).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{Backend, BackendRequest, Service, error_message};
use crate::error::{BackendError, Result};

/// Status recorded when the caller does not give one
pub const DEFAULT_PAYMENT_STATUS: &str = "succeeded";

/// Completed payment as posted by the portal
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePaymentRequest {
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub payment_intent_id: Option<String>,
    #[serde(default)]
    pub invoice_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
}

/// Payment record in the shape the student API stores
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub student_id: String,
    pub student_name: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: String,
    pub payment_intent_id: Option<String>,
    pub invoice_id: Option<String>,
    pub status: String,
    pub purpose: Option<String>,
    pub paid_at: DateTime<Utc>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl SavePaymentRequest {
    /// Validate required fields and fill defaults
    pub fn into_record(self, paid_at: DateTime<Utc>) -> Result<PaymentRecord> {
        let student_id = non_blank(self.student_id);
        let payment_intent_id = non_blank(self.payment_intent_id);
        let invoice_id = non_blank(self.invoice_id);

        let mut missing = Vec::new();
        if student_id.is_none() {
            missing.push("studentId");
        }
        if self.amount.is_none() {
            missing.push("amount");
        }
        if payment_intent_id.is_none() && invoice_id.is_none() {
            missing.push("paymentIntentId or invoiceId");
        }

        let (Some(student_id), Some(amount)) = (student_id, self.amount) else {
            return Err(BackendError::Validation(format!(
                "Missing required field(s): {}",
                missing.join(", ")
            )));
        };
        if !missing.is_empty() {
            return Err(BackendError::Validation(format!(
                "Missing required field(s): {}",
                missing.join(", ")
            )));
        }

        Ok(PaymentRecord {
            student_id,
            student_name: non_blank(self.student_name),
            amount,
            currency: non_blank(self.currency)
                .map_or_else(|| "usd".to_string(), |c| c.to_lowercase()),
            payment_intent_id,
            invoice_id,
            status: non_blank(self.status).unwrap_or_else(|| DEFAULT_PAYMENT_STATUS.to_string()),
            purpose: non_blank(self.purpose),
            paid_at,
        })
    }
}

/// Payment persistence and history over the student API
#[derive(Clone)]
pub struct PaymentsApi {
    backend: Arc<dyn Backend>,
}

impl PaymentsApi {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Store a payment; returns the backend's record id
    pub async fn save_payment(&self, record: &PaymentRecord) -> Result<String> {
        let response = self
            .backend
            .send(BackendRequest::post(
                Service::Student,
                "save_payment",
                serde_json::to_value(record)?,
            ))
            .await?
            .error_for_status()?;

        let body = response.json()?;
        if body.get("success").and_then(Value::as_bool) == Some(false) {
            return Err(BackendError::Rejected(
                error_message(&body).unwrap_or_else(|| "Failed to save payment".into()),
            ));
        }

        let payment_id = ["payment_id", "paymentId", "id"]
            .into_iter()
            .find_map(|key| match body.get(key) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .ok_or_else(|| BackendError::InvalidResponse("no payment id returned".into()))?;

        tracing::info!(
            payment_id = %payment_id,
            student_id = %record.student_id,
            amount = %record.amount,
            "Saved payment"
        );

        Ok(payment_id)
    }

    /// Past payments for a student
    pub async fn payment_history(&self, student_id: &str) -> Result<Vec<Value>> {
        let response = self
            .backend
            .send(BackendRequest::get(Service::Student, "get_payments").query("student_id", student_id))
            .await?
            .error_for_status()?;

        match response.json()? {
            Value::Array(payments) => Ok(payments),
            Value::Object(mut body) => {
                if body.get("success").and_then(Value::as_bool) == Some(false) {
                    return Err(BackendError::Rejected(
                        error_message(&Value::Object(body))
                            .unwrap_or_else(|| "Failed to load payments".into()),
                    ));
                }
                ["payments", "data"]
                    .into_iter()
                    .find_map(|key| match body.remove(key) {
                        Some(Value::Array(payments)) => Some(payments),
                        _ => None,
                    })
                    .ok_or_else(|| BackendError::InvalidResponse("no payments list".into()))
            }
            _ => Err(BackendError::InvalidResponse("unexpected payments body".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn save_request() -> SavePaymentRequest {
        SavePaymentRequest {
            student_id: Some("S-1001".into()),
            amount: Some(dec!(500.00)),
            currency: Some("USD".into()),
            payment_intent_id: Some("pi_123".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_record_defaults() {
        let record = save_request().into_record(Utc::now()).unwrap();
        assert_eq!(record.currency, "usd");
        assert_eq!(record.status, DEFAULT_PAYMENT_STATUS);
        assert!(record.invoice_id.is_none());
    }

    #[test]
    fn test_record_requires_identifiers() {
        let mut request = save_request();
        request.payment_intent_id = None;
        let err = request.into_record(Utc::now()).unwrap_err();
        assert!(err.is_client_error());
        assert!(err.to_string().contains("paymentIntentId or invoiceId"));

        let err = SavePaymentRequest::default().into_record(Utc::now()).unwrap_err();
        assert!(err.to_string().contains("studentId"));
        assert!(err.to_string().contains("amount"));
    }

    #[tokio::test]
    async fn test_save_payment_returns_backend_id() {
        let backend = Arc::new(MockBackend::new().respond_json(
            Service::Student,
            "save_payment",
            json!({"success": true, "payment_id": 42}),
        ));
        let api = PaymentsApi::new(backend.clone());
        let record = save_request().into_record(Utc::now()).unwrap();

        assert_eq!(api.save_payment(&record).await.unwrap(), "42");

        let requests = backend.requests().await;
        let body = requests[0].body.as_ref().unwrap();
        assert_eq!(body["student_id"], "S-1001");
        assert_eq!(body["amount"], 500.0);
        assert_eq!(body["payment_intent_id"], "pi_123");
    }

    #[tokio::test]
    async fn test_save_payment_surfaces_failures() {
        let record = save_request().into_record(Utc::now()).unwrap();

        let rejected = PaymentsApi::new(Arc::new(MockBackend::new().respond_json(
            Service::Student,
            "save_payment",
            json!({"success": false, "error": "Duplicate payment"}),
        )));
        assert!(matches!(
            rejected.save_payment(&record).await,
            Err(BackendError::Rejected(msg)) if msg == "Duplicate payment"
        ));

        let broken = PaymentsApi::new(Arc::new(MockBackend::new().respond(
            Service::Student,
            "save_payment",
            200,
            "<html>Fatal error</html>",
        )));
        assert!(matches!(
            broken.save_payment(&record).await,
            Err(BackendError::InvalidResponse(_))
        ));

        let down = PaymentsApi::new(Arc::new(MockBackend::unavailable()));
        assert!(down.save_payment(&record).await.is_err());
    }

    #[tokio::test]
    async fn test_history_accepts_both_shapes() {
        let wrapped = PaymentsApi::new(Arc::new(MockBackend::new().respond_json(
            Service::Student,
            "get_payments",
            json!({"success": true, "payments": [{"id": 1}, {"id": 2}]}),
        )));
        assert_eq!(wrapped.payment_history("S-1").await.unwrap().len(), 2);

        let bare = PaymentsApi::new(Arc::new(MockBackend::new().respond_json(
            Service::Student,
            "get_payments",
            json!([{"id": 1}]),
        )));
        assert_eq!(bare.payment_history("S-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_history_queries_by_student() {
        let backend = Arc::new(MockBackend::new().respond_json(
            Service::Student,
            "get_payments",
            json!({"data": []}),
        ));
        PaymentsApi::new(backend.clone())
            .payment_history("S-77")
            .await
            .unwrap();

        let requests = backend.requests().await;
        assert_eq!(requests[0].query, vec![("student_id".to_string(), "S-77".to_string())]);
    }
}
