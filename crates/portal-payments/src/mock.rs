//! Mock Billing Provider
//!
//! In-memory `BillingProvider` for tests. Records every call so flows can be
//! asserted on, and can be told to fail at a named step.

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};

use crate::billing::{
    BillingProvider, CustomerRecord, DraftInvoice, InvoiceLine, InvoiceRecord, NewCustomer,
    NewPaymentIntent, PaymentIntentRecord,
};
use crate::error::{PaymentError, Result};

#[derive(Default)]
struct MockState {
    customers: Vec<CustomerRecord>,
    invoices: Vec<InvoiceRecord>,
    lines: Vec<InvoiceLine>,
    intents: Vec<NewPaymentIntent>,
    calls: Vec<&'static str>,
}

/// Mock billing provider with in-memory state
#[derive(Default)]
pub struct MockBilling {
    state: Mutex<MockState>,
    fail_on: Option<&'static str>,
}

impl MockBilling {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing customer
    pub fn with_customer(mut self, id: &str, email: &str) -> Self {
        self.state.get_mut().customers.push(CustomerRecord {
            id: id.to_string(),
            email: Some(email.to_string()),
            name: None,
        });
        self
    }

    /// Fail the named operation (e.g. `"add_invoice_line"`)
    pub fn failing_on(mut self, operation: &'static str) -> Self {
        self.fail_on = Some(operation);
        self
    }

    /// Operations called so far, in order
    pub async fn calls(&self) -> Vec<&'static str> {
        self.state.lock().await.calls.clone()
    }

    /// Invoice lines added so far
    pub async fn lines(&self) -> Vec<InvoiceLine> {
        self.state.lock().await.lines.clone()
    }

    /// PaymentIntents requested so far
    pub async fn intents(&self) -> Vec<NewPaymentIntent> {
        self.state.lock().await.intents.clone()
    }

    /// Customers known to the mock
    pub async fn customers(&self) -> Vec<CustomerRecord> {
        self.state.lock().await.customers.clone()
    }

    async fn record(&self, operation: &'static str) -> Result<MutexGuard<'_, MockState>> {
        let mut state = self.state.lock().await;
        state.calls.push(operation);
        if self.fail_on == Some(operation) {
            return Err(PaymentError::Stripe(format!("mock failure in {operation}")));
        }
        Ok(state)
    }
}

impl MockState {
    fn invoice_mut(&mut self, invoice_id: &str) -> Result<&mut InvoiceRecord> {
        self.invoices
            .iter_mut()
            .find(|i| i.id == invoice_id)
            .ok_or_else(|| PaymentError::Stripe(format!("No such invoice: {invoice_id}")))
    }
}

#[async_trait]
impl BillingProvider for MockBilling {
    async fn find_customer_by_email(&self, email: &str) -> Result<Option<CustomerRecord>> {
        let state = self.record("find_customer_by_email").await?;
        Ok(state
            .customers
            .iter()
            .find(|c| c.email.as_deref() == Some(email))
            .cloned())
    }

    async fn create_customer(&self, customer: &NewCustomer) -> Result<CustomerRecord> {
        let mut state = self.record("create_customer").await?;
        let record = CustomerRecord {
            id: format!("cus_mock_{}", state.customers.len() + 1),
            email: Some(customer.email.clone()),
            name: Some(customer.name.clone()),
        };
        state.customers.push(record.clone());
        Ok(record)
    }

    async fn create_invoice(&self, _invoice: &DraftInvoice) -> Result<InvoiceRecord> {
        let mut state = self.record("create_invoice").await?;
        let record = InvoiceRecord {
            id: format!("in_mock_{}", state.invoices.len() + 1),
            status: Some("draft".into()),
            ..Default::default()
        };
        state.invoices.push(record.clone());
        Ok(record)
    }

    async fn add_invoice_line(&self, line: &InvoiceLine) -> Result<()> {
        let mut state = self.record("add_invoice_line").await?;
        let total = line.unit_amount * i64::try_from(line.quantity).unwrap_or(i64::MAX);
        state.invoice_mut(&line.invoice_id)?.amount_due += total;
        state.lines.push(line.clone());
        Ok(())
    }

    async fn finalize_invoice(&self, invoice_id: &str) -> Result<InvoiceRecord> {
        let mut state = self.record("finalize_invoice").await?;
        let invoice = state.invoice_mut(invoice_id)?;
        invoice.status = Some("open".into());
        invoice.number = Some(format!("MOCK-{invoice_id}"));
        invoice.hosted_invoice_url = Some(format!("https://invoice.stripe.test/{invoice_id}"));
        invoice.invoice_pdf = Some(format!("https://invoice.stripe.test/{invoice_id}/pdf"));
        Ok(invoice.clone())
    }

    async fn send_invoice(&self, invoice_id: &str) -> Result<InvoiceRecord> {
        let mut state = self.record("send_invoice").await?;
        Ok(state.invoice_mut(invoice_id)?.clone())
    }

    async fn create_payment_intent(
        &self,
        intent: &NewPaymentIntent,
    ) -> Result<PaymentIntentRecord> {
        let mut state = self.record("create_payment_intent").await?;
        state.intents.push(intent.clone());
        let id = format!("pi_mock_{}", state.intents.len());
        Ok(PaymentIntentRecord {
            client_secret: Some(format!("{id}_secret_mock")),
            id,
            amount: intent.amount,
            status: "requires_payment_method".into(),
        })
    }

    fn name(&self) -> &str {
        "MockBilling"
    }
}
