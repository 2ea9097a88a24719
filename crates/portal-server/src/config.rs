//! Server Configuration

use portal_payments::DEFAULT_DUE_DAYS;

/// Server settings read from the environment
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind_addr: String,

    /// Due-date offset for emailed invoices
    pub invoice_due_days: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".into(),
            invoice_due_days: DEFAULT_DUE_DAYS,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            invoice_due_days: std::env::var("INVOICE_DUE_DAYS")
                .ok()
                .and_then(|d| d.parse().ok())
                .unwrap_or(defaults.invoice_due_days),
        }
    }
}
