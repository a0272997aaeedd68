//! Monetary amounts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Money amount in cents (avoids floating point issues).
///
/// Signed so that zero-priced or refunded bookings can be represented; the
/// award rules treat any non-positive price as "nothing to earn".
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero money.
    pub const ZERO: Self = Self(0);

    /// Creates a new `Money` amount from cents
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` amount from whole currency units
    #[must_use]
    pub const fn from_units(units: i64) -> Self {
        Self(units.saturating_mul(100))
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Checks if this amount is strictly positive
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// How many whole `per` fit into this amount (`floor(self / per)`).
    ///
    /// Returns `0` when either side is non-positive.
    #[must_use]
    pub const fn whole_multiples_of(self, per: Self) -> i64 {
        if self.0 <= 0 || per.0 <= 0 {
            return 0;
        }
        self.0 / per.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_and_cents() {
        let price = Money::from_units(50);
        assert_eq!(price.cents(), 5_000);
        assert_eq!(Money::from_cents(1_999).to_string(), "19.99");
    }

    #[test]
    fn whole_multiples_floor() {
        let rate = Money::from_units(10);
        assert_eq!(Money::from_units(100).whole_multiples_of(rate), 10);
        assert_eq!(Money::from_cents(9_999).whole_multiples_of(rate), 9);
        assert_eq!(Money::from_units(9).whole_multiples_of(rate), 0);
    }

    #[test]
    fn whole_multiples_non_positive() {
        let rate = Money::from_units(10);
        assert_eq!(Money::ZERO.whole_multiples_of(rate), 0);
        assert_eq!(Money::from_units(-100).whole_multiples_of(rate), 0);
        assert_eq!(Money::from_units(100).whole_multiples_of(Money::ZERO), 0);
    }

    #[test]
    fn display() {
        assert_eq!(Money::from_cents(12_345).to_string(), "123.45");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
    }
}
