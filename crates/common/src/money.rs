//! Money in integer minor-currency units.
//!
//! Every amount in the platform is an integer count of the smallest
//! denomination (paise, cents). Floating point never touches money.

use serde::{Deserialize, Serialize};

/// ISO currency code for an amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Indian rupee (minor unit: paise).
    #[default]
    Inr,
    /// US dollar (minor unit: cents).
    Usd,
    /// Euro (minor unit: cents).
    Eur,
}

impl Currency {
    /// Returns the ISO 4217 code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Inr => "INR",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
        }
    }

    /// Parses an ISO 4217 code.
    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "INR" => Some(Currency::Inr),
            "USD" => Some(Currency::Usd),
            "EUR" => Some(Currency::Eur),
            _ => None,
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An amount of money in minor currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in minor units (e.g. 70000 = ₹700.00).
    amount: i64,
    /// The currency the amount is denominated in.
    currency: Currency,
}

impl Money {
    /// Creates a new amount.
    pub fn new(amount: i64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Returns zero in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: 0,
            currency,
        }
    }

    /// Returns the amount in minor units.
    pub fn amount(&self) -> i64 {
        self.amount
    }

    /// Returns the currency.
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Returns true if the amount is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.amount > 0
    }

    /// Multiplies the amount by a quantity, keeping the currency.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            amount: self.amount * i64::from(quantity),
            currency: self.currency,
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}
