//! # Salon Loyalty Testing
//!
//! Testing utilities for the loyalty ledger.
//!
//! This crate provides:
//! - Deterministic [`Clock`] and [`IdGenerator`] mocks
//! - [`InMemoryLedgerStore`] and [`FlakyLedgerStore`]
//! - [`InMemoryBookingSource`]
//! - Fixtures and proptest strategies for bookings
//!
//! ## Example
//!
//! ```ignore
//! use salon_loyalty_testing::{fixtures, InMemoryBookingSource, InMemoryLedgerStore};
//!
//! #[tokio::test]
//! async fn awards_once() {
//!     let store = InMemoryLedgerStore::new();
//!     let bookings = InMemoryBookingSource::new();
//!     bookings.insert(fixtures::completed_booking("b-1", "u-1", "s-1", 100));
//!     // build a LoyaltyLedger over them ...
//! }
//! ```

use chrono::{DateTime, Utc};
use salon_loyalty_core::environment::{Clock, IdGenerator};

mod booking_source;
mod ledger_store;

pub use booking_source::InMemoryBookingSource;
pub use ledger_store::{FlakyLedgerStore, InMemoryLedgerStore};

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, IdGenerator, Utc};
    use salon_loyalty_core::AwardEventId;
    use std::sync::atomic::{AtomicU64, Ordering};
    use uuid::Uuid;

    /// Fixed clock for deterministic tests
    ///
    /// # Example
    ///
    /// ```
    /// use salon_loyalty_testing::mocks::test_clock;
    /// use salon_loyalty_core::environment::Clock;
    ///
    /// let clock = test_clock();
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::days(20_089))
    }

    /// Ids `00000000-0000-0000-0000-000000000001`, `...02`, and so on.
    #[derive(Debug, Default)]
    pub struct SequentialIdGenerator {
        next: AtomicU64,
    }

    impl SequentialIdGenerator {
        /// Start at 1.
        #[must_use]
        pub const fn new() -> Self {
            Self {
                next: AtomicU64::new(0),
            }
        }
    }

    impl IdGenerator for SequentialIdGenerator {
        fn next_id(&self) -> AwardEventId {
            let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
            AwardEventId::from_uuid(Uuid::from_u128(u128::from(n)))
        }
    }
}

/// Ready-made domain values.
pub mod fixtures {
    use super::mocks::test_clock;
    use super::Clock;
    use salon_loyalty_core::{
        Booking, BookingId, BookingStatus, EarningRule, Money, SalonId, UserId,
    };

    /// One coin and one salon point per 10.00 spent, signup bonus 50,
    /// redemption from 100 points up to 30% of a booking.
    #[must_use]
    pub fn standard_rule() -> EarningRule {
        EarningRule::new(Money::from_units(10))
            .with_signup_bonus(50)
            .with_redemption(100, 30)
    }

    /// Like [`standard_rule`] without a signup bonus.
    #[must_use]
    pub fn rule_without_bonus() -> EarningRule {
        EarningRule::new(Money::from_units(10)).with_redemption(100, 30)
    }

    /// A booking in `status` priced at `price_units` whole units.
    #[must_use]
    pub fn booking(
        id: &str,
        user: &str,
        salon: &str,
        price_units: i64,
        status: BookingStatus,
    ) -> Booking {
        Booking {
            id: BookingId::new(id),
            salon_id: SalonId::new(salon),
            user_id: UserId::new(user),
            final_price: Money::from_units(price_units),
            status,
            completed_at: (status == BookingStatus::Completed).then(|| test_clock().now()),
        }
    }

    /// A completed booking priced at `price_units` whole units.
    #[must_use]
    pub fn completed_booking(id: &str, user: &str, salon: &str, price_units: i64) -> Booking {
        booking(id, user, salon, price_units, BookingStatus::Completed)
    }
}

/// Proptest strategies for domain values.
pub mod properties {
    use proptest::prelude::*;
    use salon_loyalty_core::{Booking, BookingId, BookingStatus, Money, SalonId, UserId};

    /// Up to `max` completed bookings of `user` across three salons, with
    /// distinct ids and prices between 0.00 and 500.00.
    pub fn arb_completed_bookings(user: &'static str, max: usize) -> impl Strategy<Value = Vec<Booking>> {
        proptest::collection::vec((0_usize..3, 0_i64..50_000), 0..=max).prop_map(move |rows| {
            rows.into_iter()
                .enumerate()
                .map(|(n, (salon, cents))| Booking {
                    id: BookingId::new(format!("b-{n}")),
                    salon_id: SalonId::new(format!("s-{salon}")),
                    user_id: UserId::new(user),
                    final_price: Money::from_cents(cents),
                    status: BookingStatus::Completed,
                    completed_at: None,
                })
                .collect()
        })
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, SequentialIdGenerator, test_clock};
