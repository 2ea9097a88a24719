//! Stripe Billing Provider
//!
//! `BillingProvider` backed by the Stripe API through `async-stripe`.

use async_trait::async_trait;
use serde::Serialize;
use stripe::{
    Client, CollectionMethod, CreateCustomer, CreateInvoice, CreateInvoiceItem,
    CreatePaymentIntent, CreatePaymentIntentAutomaticPaymentMethods, Customer, CustomerId,
    Invoice, InvoiceId, InvoiceItem, ListCustomers, PaymentIntent, RequestStrategy,
};

use crate::billing::{
    BillingProvider, CustomerRecord, DraftInvoice, InvoiceLine, InvoiceRecord, NewCustomer,
    NewPaymentIntent, PaymentIntentRecord,
};
use crate::error::{PaymentError, Result};
use crate::money::stripe_currency;

/// Stripe keys read from the environment
#[derive(Clone, Debug, Default)]
pub struct StripeConfig {
    /// Secret API key; payments are disabled without it
    pub secret_key: Option<String>,

    /// Publishable key handed to the browser
    pub publishable_key: Option<String>,

    /// Signing secret for `/webhooks/stripe`
    pub webhook_secret: Option<String>,
}

impl StripeConfig {
    pub fn from_env() -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        Self {
            secret_key: read("STRIPE_SECRET_KEY"),
            publishable_key: read("STRIPE_PUBLISHABLE_KEY"),
            webhook_secret: read("STRIPE_WEBHOOK_SECRET"),
        }
    }
}

/// Stripe client wrapper
pub struct StripeClient {
    client: Client,
}

#[derive(Serialize)]
struct FinalizeParams {
    auto_advance: bool,
}

#[derive(Serialize)]
struct SendParams {}

impl StripeClient {
    /// Create a new Stripe client
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
        }
    }

    /// Create from configuration
    pub fn from_config(config: &StripeConfig) -> Result<Self> {
        let secret_key = config
            .secret_key
            .as_deref()
            .ok_or_else(|| PaymentError::Config("STRIPE_SECRET_KEY not set".into()))?;

        Ok(Self::new(secret_key))
    }

    fn customer_id(id: &str) -> Result<CustomerId> {
        id.parse()
            .map_err(|_| PaymentError::Stripe(format!("Invalid customer id: {id}")))
    }

    fn invoice_id(id: &str) -> Result<InvoiceId> {
        id.parse()
            .map_err(|_| PaymentError::Stripe(format!("Invalid invoice id: {id}")))
    }

    fn invoice_record(invoice: Invoice) -> InvoiceRecord {
        InvoiceRecord {
            id: invoice.id.to_string(),
            number: invoice.number,
            status: invoice.status.map(|s| s.as_str().to_string()),
            hosted_invoice_url: invoice.hosted_invoice_url,
            invoice_pdf: invoice.invoice_pdf,
            amount_due: invoice.amount_due.unwrap_or_default(),
        }
    }

    fn customer_record(customer: Customer) -> CustomerRecord {
        CustomerRecord {
            id: customer.id.to_string(),
            email: customer.email,
            name: customer.name,
        }
    }
}

#[async_trait]
impl BillingProvider for StripeClient {
    async fn find_customer_by_email(&self, email: &str) -> Result<Option<CustomerRecord>> {
        let mut params = ListCustomers::new();
        params.email = Some(email);
        params.limit = Some(1);

        let customers = Customer::list(&self.client, &params).await?;

        Ok(customers.data.into_iter().next().map(Self::customer_record))
    }

    async fn create_customer(&self, customer: &NewCustomer) -> Result<CustomerRecord> {
        let mut params = CreateCustomer::new();
        params.email = Some(&customer.email);
        params.name = Some(&customer.name);
        params.metadata = Some(customer.metadata.clone());

        let created = Customer::create(&self.client, params).await?;

        Ok(Self::customer_record(created))
    }

    async fn create_invoice(&self, invoice: &DraftInvoice) -> Result<InvoiceRecord> {
        let mut params = CreateInvoice::new();
        params.customer = Some(Self::customer_id(&invoice.customer_id)?);
        params.collection_method = Some(CollectionMethod::SendInvoice);
        params.days_until_due = Some(invoice.days_until_due);
        params.currency = Some(stripe_currency(&invoice.currency)?);
        params.auto_advance = Some(false);
        params.description = invoice.description.as_deref();
        params.metadata = Some(invoice.metadata.clone());

        let created = Invoice::create(&self.client, params).await?;

        Ok(Self::invoice_record(created))
    }

    async fn add_invoice_line(&self, line: &InvoiceLine) -> Result<()> {
        let mut params = CreateInvoiceItem::new(Self::customer_id(&line.customer_id)?);
        params.invoice = Some(Self::invoice_id(&line.invoice_id)?);
        params.currency = Some(stripe_currency(&line.currency)?);
        params.description = Some(&line.description);
        params.unit_amount = Some(line.unit_amount);
        params.quantity = Some(line.quantity);

        InvoiceItem::create(&self.client, params).await?;

        Ok(())
    }

    async fn finalize_invoice(&self, invoice_id: &str) -> Result<InvoiceRecord> {
        let invoice: Invoice = self
            .client
            .post_form(
                &format!("/invoices/{invoice_id}/finalize"),
                FinalizeParams { auto_advance: false },
            )
            .await?;

        Ok(Self::invoice_record(invoice))
    }

    async fn send_invoice(&self, invoice_id: &str) -> Result<InvoiceRecord> {
        let invoice: Invoice = self
            .client
            .post_form(&format!("/invoices/{invoice_id}/send"), SendParams {})
            .await?;

        Ok(Self::invoice_record(invoice))
    }

    async fn create_payment_intent(
        &self,
        intent: &NewPaymentIntent,
    ) -> Result<PaymentIntentRecord> {
        let mut params = CreatePaymentIntent::new(intent.amount, stripe_currency(&intent.currency)?);
        params.automatic_payment_methods = Some(CreatePaymentIntentAutomaticPaymentMethods {
            enabled: true,
            ..Default::default()
        });
        params.description = intent.description.as_deref();
        params.receipt_email = intent.receipt_email.as_deref();
        params.metadata = Some(intent.metadata.clone());

        let created = match &intent.idempotency_key {
            Some(key) => {
                let client = self
                    .client
                    .clone()
                    .with_strategy(RequestStrategy::Idempotent(key.clone()));
                PaymentIntent::create(&client, params).await?
            }
            None => PaymentIntent::create(&self.client, params).await?,
        };

        Ok(PaymentIntentRecord {
            id: created.id.to_string(),
            client_secret: created.client_secret,
            amount: created.amount,
            status: created.status.as_str().to_string(),
        })
    }

    fn name(&self) -> &str {
        "Stripe"
    }
}
