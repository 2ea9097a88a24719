//! PaymentIntent Creation
//!
//! One-off card payments confirmed in the browser with the returned client
//! secret.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::billing::{BillingProvider, Metadata, NewPaymentIntent};
use crate::error::{PaymentError, Result};
use crate::money::{self, DEFAULT_CURRENCY};

/// Request to start a card payment
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentRequest {
    /// Major units
    #[serde(default)]
    pub amount: Option<Decimal>,

    #[serde(default)]
    pub currency: Option<String>,

    #[serde(default)]
    pub student_id: Option<String>,

    #[serde(default)]
    pub student_name: Option<String>,

    #[serde(default)]
    pub student_email: Option<String>,

    /// What the payment is for (e.g. "Application fee")
    #[serde(default)]
    pub purpose: Option<String>,
}

/// A PaymentIntent ready for client-side confirmation
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPaymentIntent {
    pub payment_intent_id: String,
    pub client_secret: String,
    /// Minor units
    pub amount: i64,
    pub currency: String,
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Creates PaymentIntents against a billing provider
pub struct IntentService {
    billing: Arc<dyn BillingProvider>,
}

impl IntentService {
    pub fn new(billing: Arc<dyn BillingProvider>) -> Self {
        Self { billing }
    }

    /// Create a PaymentIntent and return its client secret
    ///
    /// `idempotency_key` is forwarded when present; without it a retried
    /// request creates a second PaymentIntent.
    pub async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
        idempotency_key: Option<String>,
    ) -> Result<CreatedPaymentIntent> {
        let student_id = non_blank(request.student_id.as_ref())
            .ok_or_else(|| PaymentError::Validation("Missing required field(s): studentId".into()))?;
        let amount = request
            .amount
            .ok_or_else(|| PaymentError::Validation("Missing required field(s): amount".into()))?;

        let currency =
            money::normalize_currency(request.currency.as_deref().unwrap_or(DEFAULT_CURRENCY))?;
        let minor = money::to_minor_units(amount, &currency)?;

        let mut metadata = Metadata::new();
        metadata.insert("student_id".into(), student_id.to_string());
        if let Some(name) = non_blank(request.student_name.as_ref()) {
            metadata.insert("student_name".into(), name.to_string());
        }
        let purpose = non_blank(request.purpose.as_ref());
        if let Some(purpose) = purpose {
            metadata.insert("purpose".into(), purpose.to_string());
        }

        let intent = self
            .billing
            .create_payment_intent(&NewPaymentIntent {
                amount: minor,
                currency: currency.clone(),
                description: purpose.map(str::to_string),
                receipt_email: non_blank(request.student_email.as_ref()).map(str::to_string),
                metadata,
                idempotency_key,
            })
            .await?;

        let client_secret = intent.client_secret.ok_or_else(|| {
            PaymentError::Stripe("No client secret returned".into())
        })?;

        tracing::info!(
            payment_intent_id = %intent.id,
            student_id = %student_id,
            amount = minor,
            currency = %currency,
            "Created payment intent"
        );

        Ok(CreatedPaymentIntent {
            payment_intent_id: intent.id,
            client_secret,
            amount: intent.amount,
            currency,
        })
    }
}
