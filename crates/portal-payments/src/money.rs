//! Currency and minor-unit conversion
//!
//! Stripe amount fields are integers in the currency's smallest unit. Amounts
//! reach us as decimals, so conversion rounds half away from zero on the exact
//! decimal value: `10.005` USD becomes `1001` cents.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{PaymentError, Result};

/// Default currency when a request omits one
pub const DEFAULT_CURRENCY: &str = "usd";

/// Currencies Stripe charges without a fractional part
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "bif", "clp", "djf", "gnf", "jpy", "kmf", "krw", "mga", "pyg", "rwf", "ugx", "vnd", "vuv",
    "xaf", "xof", "xpf",
];

/// Lowercase a currency code and check Stripe recognises it
pub fn normalize_currency(code: &str) -> Result<String> {
    let code = code.trim().to_lowercase();
    stripe_currency(&code)?;
    Ok(code)
}

/// Parse a normalized code into the Stripe enum
pub(crate) fn stripe_currency(code: &str) -> Result<stripe::Currency> {
    serde_json::from_value(serde_json::Value::String(code.to_string()))
        .map_err(|_| PaymentError::UnsupportedCurrency(code.to_string()))
}

/// Number of decimal places in the currency's minor unit
pub fn minor_unit_exponent(currency: &str) -> u32 {
    if ZERO_DECIMAL_CURRENCIES.contains(&currency) {
        0
    } else {
        2
    }
}

/// Convert a positive decimal amount into integer minor units
pub fn to_minor_units(amount: Decimal, currency: &str) -> Result<i64> {
    if amount <= Decimal::ZERO {
        return Err(PaymentError::InvalidAmount(format!(
            "amount must be greater than zero, got {amount}"
        )));
    }

    let exponent = minor_unit_exponent(currency);
    let scaled = amount
        .checked_mul(Decimal::from(10_i64.pow(exponent)))
        .ok_or_else(|| PaymentError::InvalidAmount(amount.to_string()))?;

    scaled
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| PaymentError::InvalidAmount(amount.to_string()))
}

/// Convert Stripe minor units back into a decimal amount
pub fn from_minor_units(minor: i64, currency: &str) -> Decimal {
    Decimal::new(minor, minor_unit_exponent(currency))
}
