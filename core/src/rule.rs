//! Earning rules and the award rule engine.
//!
//! [`evaluate`] is a pure function from a booking to the awards it is owed.
//! Whether those awards are actually persisted is the ledger store's decision
//! (see [`crate::ledger`]).
//!
//! # Example
//!
//! ```
//! use salon_loyalty_core::booking::{Booking, BookingStatus};
//! use salon_loyalty_core::ids::{BookingId, SalonId, UserId};
//! use salon_loyalty_core::money::Money;
//! use salon_loyalty_core::rule::{evaluate, EarningRule};
//!
//! let rule = EarningRule::new(Money::from_units(10));
//! let booking = Booking {
//!     id: BookingId::new("b-1"),
//!     salon_id: SalonId::new("s-1"),
//!     user_id: UserId::new("u-1"),
//!     final_price: Money::from_units(100),
//!     status: BookingStatus::Completed,
//!     completed_at: None,
//! };
//!
//! let awards = evaluate(&rule, &booking)?;
//! assert_eq!(awards.len(), 2);
//! assert!(awards.iter().all(|award| award.amount == 10));
//! # Ok::<(), salon_loyalty_core::LedgerError>(())
//! ```

use crate::award::{AwardKey, Currency, MAX_AWARD_AMOUNT, PendingAward};
use crate::booking::Booking;
use crate::error::LedgerError;
use crate::ids::SalonId;
use crate::money::Money;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;

/// Awards owed for one booking: at most a coin and a salon point award.
pub type BookingAwards = SmallVec<[PendingAward; 2]>;

/// Platform earning and redemption configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningRule {
    /// Spend required for one coin
    pub coin_earning_rate: Money,
    /// Coins granted on enrollment
    pub coin_signup_bonus: i64,
    /// Minimum total points before any redemption is allowed
    pub coin_min_redemption: i64,
    /// Largest share of a booking total payable with points (0-100)
    pub coin_max_discount_percent: u8,
    /// Per-salon spend required for one salon point; salons without an entry
    /// use `coin_earning_rate`
    #[serde(default)]
    pub salon_point_rates: HashMap<SalonId, Money>,
}

impl EarningRule {
    /// Rule with the given coin rate, no bonus and no redemption allowance.
    #[must_use]
    pub fn new(coin_earning_rate: Money) -> Self {
        Self {
            coin_earning_rate,
            coin_signup_bonus: 0,
            coin_min_redemption: 0,
            coin_max_discount_percent: 0,
            salon_point_rates: HashMap::new(),
        }
    }

    /// Set the signup bonus.
    #[must_use]
    pub fn with_signup_bonus(mut self, bonus: i64) -> Self {
        self.coin_signup_bonus = bonus;
        self
    }

    /// Set the redemption thresholds.
    #[must_use]
    pub fn with_redemption(mut self, min_points: i64, max_discount_percent: u8) -> Self {
        self.coin_min_redemption = min_points;
        self.coin_max_discount_percent = max_discount_percent;
        self
    }

    /// Override the salon point rate for one salon.
    #[must_use]
    pub fn with_salon_rate(mut self, salon_id: SalonId, rate: Money) -> Self {
        self.salon_point_rates.insert(salon_id, rate);
        self
    }

    /// Spend required for one salon point at `salon_id`.
    #[must_use]
    pub fn salon_rate(&self, salon_id: &SalonId) -> Money {
        self.salon_point_rates
            .get(salon_id)
            .copied()
            .unwrap_or(self.coin_earning_rate)
    }

    /// Validate the rule.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ConfigMissing`] describing the first invalid field:
    /// a wrong rate would silently corrupt the ledger, so it is treated like an
    /// absent rule.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if !self.coin_earning_rate.is_positive() {
            return Err(LedgerError::ConfigMissing(
                "coin_earning_rate must be > 0".to_string(),
            ));
        }
        if let Some((salon, _)) = self
            .salon_point_rates
            .iter()
            .find(|(_, rate)| !rate.is_positive())
        {
            return Err(LedgerError::ConfigMissing(format!(
                "salon point rate for {salon} must be > 0"
            )));
        }
        if self.coin_signup_bonus < 0 || self.coin_min_redemption < 0 {
            return Err(LedgerError::ConfigMissing(
                "coin_signup_bonus and coin_min_redemption must be >= 0".to_string(),
            ));
        }
        if self.coin_max_discount_percent > 100 {
            return Err(LedgerError::ConfigMissing(
                "coin_max_discount_percent must be between 0 and 100".to_string(),
            ));
        }
        Ok(())
    }
}

/// Evaluate the awards a booking is owed.
///
/// Returns nothing for bookings that are not completed or have a non-positive
/// price. Awards that floor to zero are omitted.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidState`] when either award would exceed
/// [`MAX_AWARD_AMOUNT`]. Nothing is owed for such a booking until it is
/// corrected upstream.
pub fn evaluate(rule: &EarningRule, booking: &Booking) -> Result<BookingAwards, LedgerError> {
    let mut awards = BookingAwards::new();
    if !booking.is_completed() || !booking.final_price.is_positive() {
        return Ok(awards);
    }

    let coins = booking.final_price.whole_multiples_of(rule.coin_earning_rate);
    if coins > 0 {
        awards.push(PendingAward {
            key: AwardKey {
                user_id: booking.user_id.clone(),
                booking_id: Some(booking.id.clone()),
                currency: Currency::Coin,
                salon_id: None,
            },
            amount: coins,
        });
    }

    let points = booking
        .final_price
        .whole_multiples_of(rule.salon_rate(&booking.salon_id));
    if points > 0 {
        awards.push(PendingAward {
            key: AwardKey {
                user_id: booking.user_id.clone(),
                booking_id: Some(booking.id.clone()),
                currency: Currency::SalonPoint,
                salon_id: Some(booking.salon_id.clone()),
            },
            amount: points,
        });
    }

    if let Some(award) = awards.iter().find(|award| award.amount > MAX_AWARD_AMOUNT) {
        return Err(LedgerError::InvalidState(format!(
            "booking {} would earn {} {}, above the per-award ceiling of {MAX_AWARD_AMOUNT}",
            booking.id, award.amount, award.key.currency
        )));
    }
    Ok(awards)
}

/// Where the current earning rule comes from.
///
/// The rule is externally owned configuration; the ledger only reads it.
pub trait EarningRuleSource: Send + Sync {
    /// The rule in force, or `None` when none is configured.
    fn current(&self) -> Option<EarningRule>;
}

/// A rule fixed at construction time (typically loaded from the environment).
#[derive(Clone, Debug, Default)]
pub struct StaticEarningRule(Option<EarningRule>);

impl StaticEarningRule {
    /// Wrap a configured rule.
    #[must_use]
    pub const fn new(rule: EarningRule) -> Self {
        Self(Some(rule))
    }

    /// No rule configured; every award attempt fails with `ConfigMissing`.
    #[must_use]
    pub const fn missing() -> Self {
        Self(None)
    }
}

impl From<Option<EarningRule>> for StaticEarningRule {
    fn from(rule: Option<EarningRule>) -> Self {
        Self(rule)
    }
}

impl EarningRuleSource for StaticEarningRule {
    fn current(&self) -> Option<EarningRule> {
        self.0.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::booking::BookingStatus;
    use crate::ids::{BookingId, UserId};
    use proptest::prelude::*;

    fn booking(price: Money, status: BookingStatus) -> Booking {
        Booking {
            id: BookingId::new("b-1"),
            salon_id: SalonId::new("s-1"),
            user_id: UserId::new("u-1"),
            final_price: price,
            status,
            completed_at: None,
        }
    }

    #[test]
    fn completed_booking_earns_coin_and_salon_point() {
        let rule = EarningRule::new(Money::from_units(10));
        let awards = evaluate(&rule, &booking(Money::from_units(100), BookingStatus::Completed)).unwrap();

        assert_eq!(awards.len(), 2);
        assert_eq!(awards[0].key.currency, Currency::Coin);
        assert_eq!(awards[0].key.salon_id, None);
        assert_eq!(awards[0].amount, 10);
        assert_eq!(awards[1].key.currency, Currency::SalonPoint);
        assert_eq!(awards[1].key.salon_id, Some(SalonId::new("s-1")));
        assert_eq!(awards[1].amount, 10);
    }

    #[test]
    fn amounts_are_floored() {
        let rule = EarningRule::new(Money::from_units(10));
        let awards = evaluate(&rule, &booking(Money::from_cents(5_999), BookingStatus::Completed)).unwrap();
        assert!(awards.iter().all(|award| award.amount == 5));
    }

    #[test]
    fn not_completed_or_free_bookings_earn_nothing() {
        let rule = EarningRule::new(Money::from_units(10));
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
        ] {
            assert!(evaluate(&rule, &booking(Money::from_units(100), status)).unwrap().is_empty());
        }
        assert!(evaluate(&rule, &booking(Money::ZERO, BookingStatus::Completed)).unwrap().is_empty());
        assert!(
            evaluate(&rule, &booking(Money::from_units(-20), BookingStatus::Completed))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn price_below_rate_earns_nothing() {
        let rule = EarningRule::new(Money::from_units(10));
        assert!(
            evaluate(&rule, &booking(Money::from_units(9), BookingStatus::Completed))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn awards_above_ceiling_are_refused() {
        let rule = EarningRule::new(Money::from_cents(1));
        let result = evaluate(&rule, &booking(Money::from_cents(i64::MAX), BookingStatus::Completed));
        assert!(matches!(result, Err(LedgerError::InvalidState(_))));

        let at_ceiling = booking(Money::from_cents(MAX_AWARD_AMOUNT), BookingStatus::Completed);
        assert_eq!(evaluate(&rule, &at_ceiling).unwrap().len(), 2);
    }

    #[test]
    fn salon_override_changes_only_salon_points() {
        let rule = EarningRule::new(Money::from_units(10))
            .with_salon_rate(SalonId::new("s-1"), Money::from_units(5));
        let awards = evaluate(&rule, &booking(Money::from_units(100), BookingStatus::Completed)).unwrap();
        assert_eq!(awards[0].amount, 10);
        assert_eq!(awards[1].amount, 20);
    }

    #[test]
    fn validate_rejects_bad_rules() {
        assert!(EarningRule::new(Money::ZERO).validate().is_err());
        assert!(
            EarningRule::new(Money::from_units(10))
                .with_redemption(0, 101)
                .validate()
                .is_err()
        );
        assert!(
            EarningRule::new(Money::from_units(10))
                .with_salon_rate(SalonId::new("s"), Money::ZERO)
                .validate()
                .is_err()
        );
        assert!(
            EarningRule::new(Money::from_units(10))
                .with_signup_bonus(50)
                .with_redemption(100, 30)
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn static_source_missing() {
        assert!(StaticEarningRule::missing().current().is_none());
        assert!(StaticEarningRule::new(EarningRule::new(Money::from_units(1))).current().is_some());
    }

    proptest! {
        #[test]
        fn evaluation_is_deterministic(price in -10_000_i64..1_000_000, rate in 1_i64..10_000) {
            let rule = EarningRule::new(Money::from_cents(rate));
            let b = booking(Money::from_cents(price), BookingStatus::Completed);
            prop_assert_eq!(evaluate(&rule, &b), evaluate(&rule, &b));
        }

        #[test]
        fn awards_never_exceed_price_over_rate(price in 0_i64..1_000_000, rate in 1_i64..10_000) {
            let rule = EarningRule::new(Money::from_cents(rate));
            let b = booking(Money::from_cents(price), BookingStatus::Completed);
            for award in evaluate(&rule, &b).unwrap() {
                prop_assert!(award.amount > 0);
                prop_assert!(award.amount * rate <= price);
            }
        }
    }
}
