//! Property tests for the ledger invariants.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use salon_loyalty_core::rule::evaluate;
use salon_loyalty_core::{AwardReason, Booking, LedgerStore, StaticEarningRule, UserId};
use salon_loyalty_runtime::{LoyaltyLedger, RetryPolicy};
use salon_loyalty_testing::fixtures::standard_rule;
use salon_loyalty_testing::properties::arb_completed_bookings;
use salon_loyalty_testing::{InMemoryBookingSource, InMemoryLedgerStore};
use std::collections::HashMap;
use std::sync::Arc;

fn ledger(store: &InMemoryLedgerStore, bookings: &[Booking]) -> LoyaltyLedger {
    LoyaltyLedger::new(
        Arc::new(store.clone()),
        Arc::new(InMemoryBookingSource::with_bookings(bookings.iter().cloned())),
        Arc::new(StaticEarningRule::new(standard_rule())),
    )
    .with_retry_policy(RetryPolicy::no_retry())
}

fn expected_total(bookings: &[Booking]) -> i64 {
    let rule = standard_rule();
    let earned: i64 = bookings
        .iter()
        .flat_map(|b| evaluate(&rule, b).unwrap())
        .map(|award| award.amount)
        .sum();
    earned + rule.coin_signup_bonus
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn repeated_awards_write_one_event_per_key(
        bookings in arb_completed_bookings("u-1", 6),
        repeats in 1_usize..4,
    ) {
        let store = InMemoryLedgerStore::new();
        let ledger = ledger(&store, &bookings);

        tokio_test::block_on(async {
            for _ in 0..repeats {
                for booking in &bookings {
                    ledger.award_for_booking(&booking.id).await.unwrap();
                }
            }
        });

        let mut per_key: HashMap<_, usize> = HashMap::new();
        for event in store.events() {
            prop_assert_eq!(event.reason, AwardReason::Earned);
            *per_key.entry(event.key()).or_default() += 1;
        }
        prop_assert!(per_key.values().all(|count| *count == 1));
    }

    #[test]
    fn reconcile_never_decreases_total_and_converges(
        bookings in arb_completed_bookings("u-1", 8),
        awarded in proptest::collection::vec(any::<bool>(), 8),
    ) {
        let store = InMemoryLedgerStore::new();
        let ledger = ledger(&store, &bookings);
        let user = UserId::new("u-1");

        let (before, after, second) = tokio_test::block_on(async {
            for (booking, award) in bookings.iter().zip(&awarded) {
                if *award {
                    ledger.award_for_booking(&booking.id).await.unwrap();
                }
            }
            let before = ledger.total_points(&user).await.unwrap();
            ledger.reconcile(&user).await.unwrap();
            let after = ledger.total_points(&user).await.unwrap();
            let second = ledger.reconcile(&user).await.unwrap();
            (before, after, second)
        });

        prop_assert!(after >= before);
        prop_assert_eq!(after, expected_total(&bookings));
        prop_assert_eq!(second.awards_fixed, 0);
        prop_assert!(second.corrections.is_empty());
    }

    #[test]
    fn balance_total_is_coins_plus_salon_points(
        bookings in arb_completed_bookings("u-1", 8),
    ) {
        let store = InMemoryLedgerStore::new();
        let ledger = ledger(&store, &bookings);
        let user = UserId::new("u-1");

        let (view, raw) = tokio_test::block_on(async {
            ledger.reconcile(&user).await.unwrap();
            let view = ledger.get_balance(&user).await.unwrap();
            let raw = store.read_balance(user.clone()).await.unwrap();
            (view, raw)
        });

        prop_assert_eq!(view.total, view.coins + view.points_by_salon.values().sum::<i64>());
        prop_assert_eq!(view.points_by_salon, raw.points_by_salon);
        prop_assert!(store.cache_matches_log(&user));
    }
}
