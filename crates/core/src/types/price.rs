//! Price representation using decimal arithmetic.
//!
//! Billing services report a display string already localised for the user
//! alongside an integer amount in micros (millionths of the currency unit).
//! [`Price`] keeps both, so hosts can show the service's own formatting and
//! still compare amounts exactly.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price as reported by the billing service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Price {
    /// Display string formatted by the billing service (e.g. `"$4.99"`).
    pub formatted: String,
    /// Amount in micros of the currency unit (e.g. `4_990_000` for 4.99).
    pub amount_micros: i64,
    /// ISO 4217 currency code.
    pub currency_code: String,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub fn new(
        formatted: impl Into<String>,
        amount_micros: i64,
        currency_code: impl Into<String>,
    ) -> Self {
        Self {
            formatted: formatted.into(),
            amount_micros,
            currency_code: currency_code.into(),
        }
    }

    /// Amount in the currency's standard unit (e.g. dollars, not micros).
    #[must_use]
    pub fn amount(&self) -> Decimal {
        Decimal::new(self.amount_micros, 6).normalize()
    }

    /// Returns `true` if this price is zero (free trial phase).
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.amount_micros == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_amount_from_micros() {
        let price = Price::new("$4.99", 4_990_000, "USD");
        assert_eq!(price.amount(), Decimal::from_str("4.99").unwrap());
    }

    #[test]
    fn test_free_price() {
        assert!(Price::new("Free", 0, "USD").is_free());
        assert!(!Price::new("$1.00", 1_000_000, "USD").is_free());
    }
}
