//! Payment Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Request failed validation before reaching Stripe
    #[error("{0}")]
    Validation(String),

    /// Currency code Stripe does not know about
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    /// Amount cannot be represented in minor units
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Stripe API error
    #[error("Stripe error: {0}")]
    Stripe(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PaymentError {
    /// Whether the caller is at fault (maps to a 400)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PaymentError::Validation(_)
                | PaymentError::UnsupportedCurrency(_)
                | PaymentError::InvalidAmount(_)
                | PaymentError::WebhookSignature(_)
                | PaymentError::WebhookParse(_)
        )
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            PaymentError::Stripe(msg) => format!("Payment processing failed: {msg}"),
            PaymentError::Config(_) => "Payment service configuration error.".into(),
            PaymentError::WebhookSignature(_) => "Invalid signature".into(),
            other => other.to_string(),
        }
    }
}

impl From<stripe::StripeError> for PaymentError {
    fn from(err: stripe::StripeError) -> Self {
        PaymentError::Stripe(err.to_string())
    }
}
