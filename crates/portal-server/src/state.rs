//! Application State

use std::sync::Arc;

use portal_backend::{Backend, PaymentsApi};
use portal_payments::{BillingProvider, IntentService, InvoiceService, StripeConfig};

use crate::config::ServerConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// PHP backend client
    pub backend: Arc<dyn Backend>,

    /// Payment records over the student API
    pub payments: PaymentsApi,

    /// Invoice flow (None if Stripe is not configured)
    pub invoices: Option<Arc<InvoiceService>>,

    /// PaymentIntent flow (None if Stripe is not configured)
    pub intents: Option<Arc<IntentService>>,

    /// Handed to the browser for Stripe.js
    pub publishable_key: Option<String>,

    /// Signing secret for Stripe webhooks
    pub webhook_secret: Option<String>,
}

impl AppState {
    pub fn new(
        backend: Arc<dyn Backend>,
        billing: Option<Arc<dyn BillingProvider>>,
        server: &ServerConfig,
        stripe: &StripeConfig,
    ) -> Self {
        Self {
            payments: PaymentsApi::new(backend.clone()),
            backend,
            invoices: billing
                .clone()
                .map(|b| Arc::new(InvoiceService::new(b, server.invoice_due_days))),
            intents: billing.map(|b| Arc::new(IntentService::new(b))),
            publishable_key: stripe.publishable_key.clone(),
            webhook_secret: stripe.webhook_secret.clone(),
        }
    }
}
