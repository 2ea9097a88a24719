//! Invoice Creation Flow
//!
//! Find-or-create the customer, draft an invoice collected by email, attach
//! one line per item, finalize and send. Any failed step aborts the sequence;
//! objects already created in Stripe are left as they are.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::billing::{BillingProvider, DraftInvoice, InvoiceLine, Metadata, NewCustomer};
use crate::error::{PaymentError, Result};
use crate::money::{self, DEFAULT_CURRENCY};

/// Default due-date offset for emailed invoices
pub const DEFAULT_DUE_DAYS: u32 = 30;

/// One billable item as sent by the portal
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItemInput {
    #[serde(default)]
    pub description: Option<String>,

    /// Major units (e.g. dollars)
    #[serde(default)]
    pub amount: Option<Decimal>,

    #[serde(default)]
    pub quantity: Option<u64>,
}

/// Request to invoice a student
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRequest {
    #[serde(default)]
    pub student_id: Option<String>,

    #[serde(default)]
    pub student_name: Option<String>,

    #[serde(default)]
    pub student_email: Option<String>,

    #[serde(default)]
    pub items: Option<Vec<InvoiceItemInput>>,

    #[serde(default)]
    pub currency: Option<String>,

    /// Overrides the configured due-date offset
    #[serde(default)]
    pub due_days: Option<u32>,

    #[serde(default)]
    pub description: Option<String>,
}

/// A finalized, emailed invoice
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedInvoice {
    pub invoice_id: String,
    pub invoice_number: Option<String>,
    pub customer_id: String,
    pub hosted_invoice_url: Option<String>,
    pub invoice_pdf: Option<String>,

    /// Major units
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_due: Decimal,

    pub currency: String,
    pub status: Option<String>,
}

struct ValidItem {
    description: String,
    amount: Decimal,
    quantity: u64,
}

struct ValidInvoice {
    student_id: String,
    student_name: String,
    student_email: String,
    currency: String,
    due_days: Option<u32>,
    description: Option<String>,
    items: Vec<ValidItem>,
}

fn present(value: Option<&String>) -> Option<String> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty()).map(str::to_string)
}

impl InvoiceRequest {
    fn validate(&self) -> Result<ValidInvoice> {
        let student_id = present(self.student_id.as_ref());
        let student_name = present(self.student_name.as_ref());
        let student_email = present(self.student_email.as_ref());
        let items = self.items.as_ref().filter(|items| !items.is_empty());

        let mut missing = Vec::new();
        if student_id.is_none() {
            missing.push("studentId");
        }
        if student_name.is_none() {
            missing.push("studentName");
        }
        if student_email.is_none() {
            missing.push("studentEmail");
        }
        if items.is_none() {
            missing.push("items");
        }

        let (Some(student_id), Some(student_name), Some(student_email), Some(items)) =
            (student_id, student_name, student_email, items)
        else {
            return Err(PaymentError::Validation(format!(
                "Missing required field(s): {}",
                missing.join(", ")
            )));
        };

        let currency = money::normalize_currency(
            self.currency.as_deref().unwrap_or(DEFAULT_CURRENCY),
        )?;

        let items = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let description = present(item.description.as_ref()).ok_or_else(|| {
                    PaymentError::Validation(format!("Item {} is missing a description", index + 1))
                })?;
                let amount = item
                    .amount
                    .filter(|a| *a > Decimal::ZERO)
                    .ok_or_else(|| {
                        PaymentError::Validation(format!(
                            "Item {} must have an amount greater than zero",
                            index + 1
                        ))
                    })?;
                let quantity = item.quantity.unwrap_or(1);
                if quantity == 0 {
                    return Err(PaymentError::Validation(format!(
                        "Item {} must have a quantity of at least 1",
                        index + 1
                    )));
                }
                Ok(ValidItem {
                    description,
                    amount,
                    quantity,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ValidInvoice {
            student_id,
            student_name,
            student_email,
            currency,
            due_days: self.due_days,
            description: present(self.description.as_ref()),
            items,
        })
    }
}

/// Drives invoice creation against a billing provider
pub struct InvoiceService {
    billing: Arc<dyn BillingProvider>,
    default_due_days: u32,
}

impl InvoiceService {
    pub fn new(billing: Arc<dyn BillingProvider>, default_due_days: u32) -> Self {
        Self {
            billing,
            default_due_days,
        }
    }

    /// Validate, then create, fill, finalize and send an invoice
    pub async fn create_invoice(&self, request: &InvoiceRequest) -> Result<CreatedInvoice> {
        let invoice = request.validate()?;

        // Minor units up front so a bad amount never leaves a half-built invoice
        let lines = invoice
            .items
            .iter()
            .map(|item| Ok((item, money::to_minor_units(item.amount, &invoice.currency)?)))
            .collect::<Result<Vec<_>>>()?;

        let customer = match self
            .billing
            .find_customer_by_email(&invoice.student_email)
            .await?
        {
            Some(customer) => {
                tracing::debug!(customer_id = %customer.id, "Reusing existing customer");
                customer
            }
            None => {
                let mut metadata = Metadata::new();
                metadata.insert("student_id".into(), invoice.student_id.clone());
                let customer = self
                    .billing
                    .create_customer(&NewCustomer {
                        email: invoice.student_email.clone(),
                        name: invoice.student_name.clone(),
                        metadata,
                    })
                    .await?;
                tracing::info!(
                    customer_id = %customer.id,
                    student_id = %invoice.student_id,
                    "Created customer"
                );
                customer
            }
        };

        let mut metadata = Metadata::new();
        metadata.insert("student_id".into(), invoice.student_id.clone());
        metadata.insert("student_name".into(), invoice.student_name.clone());

        let draft = self
            .billing
            .create_invoice(&DraftInvoice {
                customer_id: customer.id.clone(),
                currency: invoice.currency.clone(),
                days_until_due: invoice.due_days.unwrap_or(self.default_due_days),
                description: invoice.description.clone(),
                metadata,
            })
            .await?;

        tracing::info!(
            invoice_id = %draft.id,
            student_id = %invoice.student_id,
            items = lines.len(),
            "Created draft invoice"
        );

        for (item, unit_amount) in lines {
            self.billing
                .add_invoice_line(&InvoiceLine {
                    customer_id: customer.id.clone(),
                    invoice_id: draft.id.clone(),
                    currency: invoice.currency.clone(),
                    description: item.description.clone(),
                    unit_amount,
                    quantity: item.quantity,
                })
                .await
                .inspect_err(|e| {
                    tracing::error!(invoice_id = %draft.id, error = %e, "Adding invoice line failed");
                })?;
        }

        let finalized = self.billing.finalize_invoice(&draft.id).await?;
        let sent = self.billing.send_invoice(&finalized.id).await?;

        tracing::info!(
            invoice_id = %sent.id,
            amount_due = sent.amount_due,
            email = %invoice.student_email,
            "Invoice finalized and sent"
        );

        Ok(CreatedInvoice {
            invoice_id: sent.id,
            invoice_number: sent.number.or(finalized.number),
            customer_id: customer.id,
            hosted_invoice_url: sent.hosted_invoice_url.or(finalized.hosted_invoice_url),
            invoice_pdf: sent.invoice_pdf.or(finalized.invoice_pdf),
            amount_due: money::from_minor_units(sent.amount_due, &invoice.currency),
            currency: invoice.currency,
            status: sent.status,
        })
    }
}
