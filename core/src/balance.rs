//! Balances as folds over the award log.
//!
//! A balance is never a second source of truth: [`Balance::fold`] over a
//! user's events is the definition, and any cached balance must agree with it.

use crate::award::{AwardEvent, AwardReason, Currency};
use crate::error::LedgerError;
use crate::ids::SalonId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw per-currency sums of one user's award log.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Sum of all coin entries, including a recorded signup bonus
    pub coins: i64,
    /// Sum of salon point entries per salon; salons netting to zero are dropped
    pub points_by_salon: BTreeMap<SalonId, i64>,
    /// Whether a `signup_bonus` entry is present in the log
    pub signup_recorded: bool,
}

impl Balance {
    /// Fold a user's events into a balance.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] if a sum leaves the `i64` range.
    pub fn fold<'a>(events: impl IntoIterator<Item = &'a AwardEvent>) -> Result<Self, LedgerError> {
        let mut balance = Self::default();
        for event in events {
            balance.apply(event)?;
        }
        Ok(balance)
    }

    /// Apply one event. Used both by [`Balance::fold`] and by caches that
    /// update incrementally on append. On error the balance is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] if a sum leaves the `i64` range.
    pub fn apply(&mut self, event: &AwardEvent) -> Result<(), LedgerError> {
        match (event.currency, &event.salon_id) {
            (Currency::Coin, _) => {
                self.coins = checked_sum(self.coins, event.amount)?;
                if event.reason == AwardReason::SignupBonus {
                    self.signup_recorded = true;
                }
            }
            (Currency::SalonPoint, Some(salon_id)) => {
                let current = self.points_by_salon.get(salon_id).copied().unwrap_or(0);
                match checked_sum(current, event.amount)? {
                    0 => {
                        self.points_by_salon.remove(salon_id);
                    }
                    points => {
                        self.points_by_salon.insert(salon_id.clone(), points);
                    }
                }
            }
            // Rejected by AwardEvent::validate before it reaches any store.
            (Currency::SalonPoint, None) => {}
        }
        Ok(())
    }

    /// Sum of all salon point balances.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] if the sum leaves the `i64` range.
    pub fn salon_points_total(&self) -> Result<i64, LedgerError> {
        self.points_by_salon
            .values()
            .try_fold(0_i64, |total, points| checked_sum(total, *points))
    }

    /// Resolve the signup bonus term and produce the user-facing view.
    ///
    /// When the log records a signup bonus it is already part of `coins`;
    /// otherwise `configured_signup_bonus` is added.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] if a sum leaves the `i64` range.
    pub fn into_view(self, configured_signup_bonus: i64) -> Result<BalanceView, LedgerError> {
        let coins = if self.signup_recorded {
            self.coins
        } else {
            checked_sum(self.coins, configured_signup_bonus)?
        };
        let total = checked_sum(coins, self.salon_points_total()?)?;
        Ok(BalanceView {
            coins,
            points_by_salon: self.points_by_salon,
            total,
        })
    }
}

fn checked_sum(a: i64, b: i64) -> Result<i64, LedgerError> {
    a.checked_add(b)
        .ok_or_else(|| LedgerError::Storage(format!("balance overflow adding {b} to {a}")))
}

/// What `get_balance` returns: coins, points per salon and their sum.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceView {
    /// Platform coin balance
    pub coins: i64,
    /// Non-zero point balances per salon
    pub points_by_salon: BTreeMap<SalonId, i64>,
    /// `coins + Σ points_by_salon`
    pub total: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ids::{AwardEventId, BookingId, UserId};
    use chrono::Utc;
    use proptest::prelude::*;

    fn event(currency: Currency, salon: Option<&str>, amount: i64, reason: AwardReason) -> AwardEvent {
        AwardEvent {
            id: AwardEventId::new(),
            user_id: UserId::new("u-1"),
            booking_id: (reason != AwardReason::SignupBonus).then(|| BookingId::new("b-1")),
            currency,
            salon_id: salon.map(SalonId::new),
            amount,
            reason,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_history_is_zero() {
        let balance = Balance::fold(&Vec::<AwardEvent>::new()).unwrap();
        assert_eq!(balance, Balance::default());
        assert_eq!(balance.into_view(0).unwrap().total, 0);
    }

    #[test]
    fn configured_bonus_applies_without_recorded_bonus() {
        let view = Balance::default().into_view(50).unwrap();
        assert_eq!(view.coins, 50);
        assert!(view.points_by_salon.is_empty());
        assert_eq!(view.total, 50);
    }

    #[test]
    fn recorded_bonus_replaces_configured_bonus() {
        let events = [event(Currency::Coin, None, 30, AwardReason::SignupBonus)];
        let view = Balance::fold(&events).unwrap().into_view(50).unwrap();
        assert_eq!(view.coins, 30);
    }

    #[test]
    fn reversal_cancels_salon_balance() {
        let events = [
            event(Currency::SalonPoint, Some("s-1"), 10, AwardReason::Earned),
            event(Currency::SalonPoint, Some("s-1"), -10, AwardReason::Reversal),
            event(Currency::SalonPoint, Some("s-2"), 4, AwardReason::Correction),
        ];
        let balance = Balance::fold(&events).unwrap();
        assert_eq!(balance.points_by_salon.len(), 1);
        assert_eq!(balance.points_by_salon[&SalonId::new("s-2")], 4);
    }

    #[test]
    fn overflowing_sums_are_errors() {
        let mut balance = Balance::default();
        balance
            .apply(&event(Currency::Coin, None, i64::MAX, AwardReason::Earned))
            .unwrap();
        let err = balance
            .apply(&event(Currency::Coin, None, 1, AwardReason::Earned))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Storage(_)));
        assert_eq!(balance.coins, i64::MAX);

        let points = [
            event(Currency::SalonPoint, Some("s-1"), i64::MAX, AwardReason::Earned),
            event(Currency::SalonPoint, Some("s-2"), 1, AwardReason::Earned),
        ];
        let balance = Balance::fold(&points).unwrap();
        assert!(balance.salon_points_total().is_err());
        assert!(balance.into_view(0).is_err());
        assert!(Balance::default().into_view(i64::MAX).is_ok());
    }

    proptest! {
        #[test]
        fn total_is_coins_plus_salon_points(
            coins in proptest::collection::vec(1_i64..500, 0..10),
            points in proptest::collection::vec((0_usize..3, 1_i64..500), 0..10),
            bonus in 0_i64..100,
        ) {
            let mut events: Vec<AwardEvent> = coins
                .iter()
                .map(|amount| event(Currency::Coin, None, *amount, AwardReason::Earned))
                .collect();
            let salons = ["s-a", "s-b", "s-c"];
            events.extend(points.iter().map(|(salon, amount)| {
                event(Currency::SalonPoint, Some(salons[*salon]), *amount, AwardReason::Earned)
            }));

            let view = Balance::fold(&events).unwrap().into_view(bonus).unwrap();
            prop_assert_eq!(view.total, view.coins + view.points_by_salon.values().sum::<i64>());
            prop_assert_eq!(view.coins, coins.iter().sum::<i64>() + bonus);
        }
    }
}
