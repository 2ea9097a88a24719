//! Billing provider abstraction
//!
//! The invoice and PaymentIntent flows talk to Stripe through this trait so
//! they can be exercised against [`MockBilling`](crate::MockBilling).

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Key/value metadata attached to Stripe objects
pub type Metadata = HashMap<String, String>;

/// A Stripe customer, as far as the portal cares
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Parameters for a new customer
#[derive(Clone, Debug)]
pub struct NewCustomer {
    pub email: String,
    pub name: String,
    pub metadata: Metadata,
}

/// Parameters for a draft invoice
#[derive(Clone, Debug)]
pub struct DraftInvoice {
    pub customer_id: String,
    pub currency: String,
    /// Due-date offset; the invoice is collected by email
    pub days_until_due: u32,
    pub description: Option<String>,
    pub metadata: Metadata,
}

/// One line on an invoice, amounts already in minor units
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvoiceLine {
    pub customer_id: String,
    pub invoice_id: String,
    pub currency: String,
    pub description: String,
    pub unit_amount: i64,
    pub quantity: u64,
}

/// Invoice state returned by the provider
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub id: String,
    pub number: Option<String>,
    pub status: Option<String>,
    pub hosted_invoice_url: Option<String>,
    pub invoice_pdf: Option<String>,
    /// Minor units
    pub amount_due: i64,
}

/// Parameters for a new PaymentIntent
#[derive(Clone, Debug)]
pub struct NewPaymentIntent {
    /// Minor units
    pub amount: i64,
    pub currency: String,
    pub description: Option<String>,
    pub receipt_email: Option<String>,
    pub metadata: Metadata,
    /// Forwarded to Stripe only when the caller supplied one
    pub idempotency_key: Option<String>,
}

/// PaymentIntent state returned by the provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntentRecord {
    pub id: String,
    pub client_secret: Option<String>,
    pub amount: i64,
    pub status: String,
}

/// Billing provider trait (Strategy pattern)
///
/// Every method is a single request against the provider. Nothing here
/// retries or compensates; callers decide what a failure means.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Look up a customer by email (first match only)
    async fn find_customer_by_email(&self, email: &str) -> Result<Option<CustomerRecord>>;

    /// Create a customer
    async fn create_customer(&self, customer: &NewCustomer) -> Result<CustomerRecord>;

    /// Create a draft invoice in send-by-email collection mode
    async fn create_invoice(&self, invoice: &DraftInvoice) -> Result<InvoiceRecord>;

    /// Attach a line item to a draft invoice
    async fn add_invoice_line(&self, line: &InvoiceLine) -> Result<()>;

    /// Finalize a draft invoice, locking its lines
    async fn finalize_invoice(&self, invoice_id: &str) -> Result<InvoiceRecord>;

    /// Email a finalized invoice to the customer
    async fn send_invoice(&self, invoice_id: &str) -> Result<InvoiceRecord>;

    /// Create a PaymentIntent for client-side confirmation
    async fn create_payment_intent(&self, intent: &NewPaymentIntent)
        -> Result<PaymentIntentRecord>;

    /// Provider name
    fn name(&self) -> &str;
}
