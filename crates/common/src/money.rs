use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A monetary amount with exact decimal arithmetic.
///
/// Wraps a [`Decimal`] so amounts never pass through binary floating
/// point. The currency lives alongside the amount in the owning record;
/// arithmetic across currencies is the caller's responsibility.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Creates a money value from a decimal amount.
    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Zero amount.
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Returns the underlying decimal.
    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns true for amounts strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::FromPrimitive;

    fn dec(value: f64) -> Decimal {
        Decimal::from_f64(value).unwrap()
    }

    #[test]
    fn positivity() {
        assert!(Money::new(dec(0.01)).is_positive());
        assert!(!Money::zero().is_positive());
        assert!(!Money::new(dec(-5.0)).is_positive());
    }

    #[test]
    fn ordering() {
        assert!(Money::new(dec(99.99)) < Money::new(dec(100.0)));
        assert!(Money::new(dec(15000.0)) > Money::new(dec(10000.0)));
    }

    #[test]
    fn wire_form_is_exact() {
        // Decimal serializes as a string to keep amounts exact, and
        // accepts plain JSON numbers on the way in.
        let money = Money::new(dec(99.99));
        let json = serde_json::to_string(&money).unwrap();
        assert_eq!(json, "\"99.99\"");

        let from_string: Money = serde_json::from_str("\"99.99\"").unwrap();
        let from_number: Money = serde_json::from_str("99.99").unwrap();
        assert_eq!(from_string, money);
        assert_eq!(from_number, money);
    }
}
