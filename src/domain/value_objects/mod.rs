//! Value Objects for the gallery checkout

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.trim().to_uppercase() } }
    pub fn eur(amount: Decimal) -> Self { Self::new(amount, "EUR") }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn is_zero(&self) -> bool { self.amount.is_zero() }
    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }

    /// Amount in the currency's minor unit (cents), as hosted checkout APIs expect.
    pub fn minor_units(&self) -> Result<i64, MoneyError> {
        (self.amount * Decimal::ONE_HUNDRED).round().to_i64().ok_or(MoneyError::OutOfRange)
    }
}

impl Default for Money { fn default() -> Self { Self::zero("EUR") } }

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:.2} {}", self.amount, self.currency) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("Currency mismatch")]
    CurrencyMismatch,
    #[error("Amount out of range")]
    OutOfRange,
}

/// ISO 3166-1 alpha-2 country code, stored upper-case.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CountryCode(String);

impl CountryCode {
    pub fn new(value: impl Into<String>) -> Result<Self, CountryCodeError> {
        let value = value.into().trim().to_uppercase();
        if value.len() != 2 || !value.chars().all(|c| c.is_ascii_alphabetic()) { return Err(CountryCodeError(value)); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("Invalid country code '{0}'")]
pub struct CountryCodeError(pub String);
