//! HTTP Handlers

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;
use portal_backend::{PaymentRecord, SavePaymentRequest};
use portal_payments::{
    CreatedInvoice, CreatedPaymentIntent, InvoiceRequest, PaymentIntentRequest, WebhookEvent,
    money, webhook,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};
use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

/// `{"success": true, ...payload}`
#[derive(Debug, Serialize)]
pub struct Success<T> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T> Success<T> {
    pub fn new(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub stripe_configured: bool,
    pub webhook_configured: bool,
    pub backend_configured: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StripeConfigResponse {
    pub publishable_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedPayment {
    pub payment_id: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentHistory {
    pub payments: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    #[serde(default, alias = "student_id")]
    pub student_id: Option<String>,
}

const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

fn payments_disabled() -> ApiError {
    ApiError::Unavailable("Payments not configured".into())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        stripe_configured: state.intents.is_some(),
        webhook_configured: state.webhook_secret.is_some(),
        backend_configured: state.backend.is_configured(),
    })
}

/// Publishable key for Stripe.js
pub async fn stripe_config(
    State(state): State<AppState>,
) -> Result<Json<Success<StripeConfigResponse>>, ApiError> {
    let publishable_key = state
        .publishable_key
        .clone()
        .ok_or_else(|| ApiError::Unavailable("Stripe publishable key not configured".into()))?;

    Ok(Success::new(StripeConfigResponse { publishable_key }))
}

/// Create a PaymentIntent for a one-off card payment
pub async fn create_payment_intent(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<PaymentIntentRequest>,
) -> Result<Json<Success<CreatedPaymentIntent>>, ApiError> {
    let intents = state.intents.as_ref().ok_or_else(payments_disabled)?;

    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let intent = intents.create_payment_intent(&payload, idempotency_key).await?;

    Ok(Success::new(intent))
}

/// Create, finalize and email an invoice
pub async fn create_invoice(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<InvoiceRequest>,
) -> Result<Json<Success<CreatedInvoice>>, ApiError> {
    let invoices = state.invoices.as_ref().ok_or_else(payments_disabled)?;

    let invoice = invoices.create_invoice(&payload).await?;

    Ok(Success::new(invoice))
}

/// Persist a completed payment through the student API
pub async fn save_payment(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SavePaymentRequest>,
) -> Result<(StatusCode, Json<Success<SavedPayment>>), ApiError> {
    let record = payload.into_record(Utc::now())?;
    let payment_id = state.payments.save_payment(&record).await?;

    Ok((StatusCode::CREATED, Success::new(SavedPayment { payment_id })))
}

/// A student's past payments
///
/// Backend failures are logged and answered with an empty list so the
/// payments page still renders.
pub async fn payment_history(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<HistoryParams>,
) -> Result<Json<Success<PaymentHistory>>, ApiError> {
    let student_id = params
        .student_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing required field(s): studentId".into()))?;

    let payments = match state.payments.payment_history(&student_id).await {
        Ok(payments) => payments,
        Err(e) => {
            tracing::warn!(student_id = %student_id, error = %e, "Payment history unavailable, returning empty list");
            Vec::new()
        }
    };

    Ok(Success::new(PaymentHistory { payments }))
}

/// Stripe webhook handler
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let secret = state
        .webhook_secret
        .as_deref()
        .ok_or_else(|| ApiError::Unavailable("Webhooks not configured".into()))?;

    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing Stripe signature".into()))?;

    let body = std::str::from_utf8(&body)
        .map_err(|_| ApiError::BadRequest("Webhook body is not valid UTF-8".into()))?;

    webhook::verify_signature(body, signature, secret, Utc::now()).map_err(|e| {
        tracing::warn!("Webhook signature failed: {}", e);
        ApiError::BadRequest("Invalid signature".into())
    })?;

    let event = webhook::parse_event(body)?;

    match event {
        WebhookEvent::InvoicePaid {
            invoice_id,
            student_id: Some(student_id),
            student_name,
            amount_paid,
            currency,
            payment_intent_id,
        } => {
            let record = PaymentRecord {
                student_id,
                student_name,
                amount: money::from_minor_units(amount_paid, &currency),
                currency,
                payment_intent_id,
                invoice_id: Some(invoice_id.clone()),
                status: "paid".into(),
                purpose: Some("Invoice".into()),
                paid_at: Utc::now(),
            };
            let payment_id = state.payments.save_payment(&record).await?;
            tracing::info!(invoice_id = %invoice_id, payment_id = %payment_id, "Recorded paid invoice");
        }
        WebhookEvent::InvoicePaid { invoice_id, .. } => {
            tracing::warn!(invoice_id = %invoice_id, "Paid invoice has no student_id metadata");
        }
        WebhookEvent::InvoicePaymentFailed {
            invoice_id,
            customer_email,
        } => {
            tracing::warn!(invoice_id = %invoice_id, email = ?customer_email, "Invoice payment failed");
        }
        WebhookEvent::PaymentSucceeded {
            payment_intent_id,
            student_id,
            amount,
            currency,
        } => {
            tracing::info!(
                payment_intent_id = %payment_intent_id,
                student_id = ?student_id,
                amount,
                currency = %currency,
                "Payment succeeded"
            );
        }
        WebhookEvent::PaymentFailed {
            payment_intent_id,
            reason,
        } => {
            tracing::warn!(payment_intent_id = %payment_intent_id, reason = ?reason, "Payment failed");
        }
        WebhookEvent::Other { event_type } => {
            tracing::debug!(event_type = %event_type, "Unhandled webhook event");
        }
    }

    Ok(Json(serde_json::json!({ "received": true })))
}

/// Fallback for unknown paths
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// Fallback for known paths hit with the wrong method
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
