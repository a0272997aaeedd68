//! Redemption gate: how many points a checkout may spend.
//!
//! The gate caps, it never errors: asking for more than allowed yields the
//! allowed amount, asking below the minimum balance yields nothing.

use salon_loyalty_core::{EarningRule, Money};
use serde::{Deserialize, Serialize};

/// Outcome of a redemption check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionDecision {
    /// Whether any redemption is permitted at all
    pub allowed: bool,
    /// Points that may be spent on this booking
    pub allowed_points: i64,
    /// Upper bound for this booking: the discount cap or the balance,
    /// whichever is lower
    pub max_allowed: i64,
}

impl RedemptionDecision {
    /// Redemption refused.
    #[must_use]
    pub const fn denied() -> Self {
        Self {
            allowed: false,
            allowed_points: 0,
            max_allowed: 0,
        }
    }
}

/// Decide a redemption for a user holding `total_points`.
///
/// One point is worth one whole currency unit, so the discount cap is
/// `floor(booking_total * pct / 100)` in whole units.
#[must_use]
pub fn can_redeem(
    rule: &EarningRule,
    total_points: i64,
    requested_points: i64,
    booking_total: Money,
) -> RedemptionDecision {
    if total_points < rule.coin_min_redemption {
        return RedemptionDecision::denied();
    }

    let max_allowed = discount_cap(booking_total, rule.coin_max_discount_percent)
        .min(total_points)
        .max(0);
    RedemptionDecision {
        allowed: true,
        allowed_points: requested_points.clamp(0, max_allowed),
        max_allowed,
    }
}

/// Largest number of whole units payable with points on `booking_total`.
#[must_use]
pub fn discount_cap(booking_total: Money, max_discount_percent: u8) -> i64 {
    if !booking_total.is_positive() {
        return 0;
    }
    let cents = i128::from(booking_total.cents()) * i128::from(max_discount_percent);
    i64::try_from(cents / 10_000).unwrap_or(i64::MAX)
}
