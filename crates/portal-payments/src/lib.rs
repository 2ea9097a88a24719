//! # portal-payments
//!
//! Stripe payment and invoicing flows for the college portal.
//!
//! ## Flows
//!
//! ### 1. Emailed invoices
//!
//! ```text
//! ┌──────────┐  by email  ┌──────────┐   draft   ┌───────────┐
//! │ Customer │──────────▶│ Invoice  │──────────▶│ Line per  │
//! │ (reuse/  │            │ (send by │            │   item    │
//! │  create) │            │  email)  │            └─────┬─────┘
//! └──────────┘            └──────────┘                  │
//!                                        finalize ◀─────┘
//!                                           │
//!                                           ▼
//!                                         send ──▶ hosted URL + PDF
//! ```
//!
//! ### 2. One-off card payments
//!
//! A PaymentIntent is created server-side and its client secret returned for
//! confirmation in the browser with Stripe.js.
//!
//! Amounts arrive as decimals and are converted to minor units with
//! half-away-from-zero rounding (see [`money`]).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use portal_payments::{InvoiceService, StripeClient, DEFAULT_DUE_DAYS};
//!
//! let stripe = Arc::new(StripeClient::new("sk_test_xxx"));
//! let invoices = InvoiceService::new(stripe, DEFAULT_DUE_DAYS);
//!
//! let invoice = invoices.create_invoice(&request).await?;
//! // Student receives an email; invoice.hosted_invoice_url links to it
//! ```

pub mod billing;
mod error;
mod intent;
mod invoice;
mod mock;
pub mod money;
mod stripe_client;
pub mod webhook;

pub use billing::{BillingProvider, CustomerRecord, InvoiceRecord, PaymentIntentRecord};
pub use error::{PaymentError, Result};
pub use intent::{CreatedPaymentIntent, IntentService, PaymentIntentRequest};
pub use invoice::{CreatedInvoice, DEFAULT_DUE_DAYS, InvoiceItemInput, InvoiceRequest, InvoiceService};
pub use mock::MockBilling;
pub use stripe_client::{StripeClient, StripeConfig};
pub use webhook::WebhookEvent;
