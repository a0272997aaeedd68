//! In-memory booking source.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use crate::mocks::test_clock;
use salon_loyalty_core::booking::BookingFuture;
use salon_loyalty_core::environment::Clock;
use salon_loyalty_core::{Booking, BookingId, BookingSource, BookingStatus, LedgerError, UserId};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// A booking service stand-in backed by a map.
///
/// Bookings are listed in id order so scans are deterministic.
#[derive(Clone, Debug, Default)]
pub struct InMemoryBookingSource {
    bookings: Arc<RwLock<BTreeMap<BookingId, Booking>>>,
    lookups: Arc<AtomicUsize>,
}

impl InMemoryBookingSource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source holding `bookings`.
    #[must_use]
    pub fn with_bookings(bookings: impl IntoIterator<Item = Booking>) -> Self {
        let source = Self::new();
        for booking in bookings {
            source.insert(booking);
        }
        source
    }

    /// Insert or replace a booking.
    pub fn insert(&self, booking: Booking) {
        self.bookings
            .write()
            .unwrap()
            .insert(booking.id.clone(), booking);
    }

    /// Move a booking to `status`, following the booking lifecycle.
    ///
    /// # Errors
    ///
    /// - `NotFound`: unknown booking
    /// - `InvalidState`: the transition is not allowed
    pub fn set_status(&self, booking_id: &BookingId, status: BookingStatus) -> Result<(), LedgerError> {
        let mut bookings = self.bookings.write().unwrap();
        let booking = bookings
            .get_mut(booking_id)
            .ok_or_else(|| LedgerError::booking_not_found(booking_id))?;

        if !booking.status.can_transition_to(status) {
            return Err(LedgerError::InvalidState(format!(
                "booking {booking_id} cannot move from {} to {status}",
                booking.status
            )));
        }
        booking.status = status;
        if status == BookingStatus::Completed {
            booking.completed_at = Some(test_clock().now());
        }
        Ok(())
    }

    /// Number of bookings held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bookings.read().unwrap().len()
    }

    /// Whether no booking is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bookings.read().unwrap().is_empty()
    }

    /// `get_booking` calls served so far.
    #[must_use]
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl BookingSource for InMemoryBookingSource {
    fn list_completed_bookings(&self, user_id: UserId) -> BookingFuture<'_, Vec<Booking>> {
        let bookings = Arc::clone(&self.bookings);
        Box::pin(async move {
            Ok(bookings
                .read()
                .unwrap()
                .values()
                .filter(|b| b.user_id == user_id && b.is_completed())
                .cloned()
                .collect())
        })
    }

    fn get_booking(&self, booking_id: BookingId) -> BookingFuture<'_, Option<Booking>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let bookings = Arc::clone(&self.bookings);
        Box::pin(async move { Ok(bookings.read().unwrap().get(&booking_id).cloned()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{booking, completed_booking};

    #[tokio::test]
    async fn lists_only_completed_bookings_of_user() {
        let source = InMemoryBookingSource::with_bookings([
            completed_booking("b-1", "u-1", "s-1", 100),
            completed_booking("b-2", "u-2", "s-1", 100),
            booking("b-3", "u-1", "s-1", 100, BookingStatus::Confirmed),
        ]);

        let listed = source
            .list_completed_bookings(UserId::new("u-1"))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, BookingId::new("b-1"));
    }

    #[test]
    fn status_follows_lifecycle() {
        let source = InMemoryBookingSource::with_bookings([booking(
            "b-1",
            "u-1",
            "s-1",
            100,
            BookingStatus::Pending,
        )]);
        let id = BookingId::new("b-1");

        assert!(source.set_status(&id, BookingStatus::Completed).is_err());
        source.set_status(&id, BookingStatus::Confirmed).unwrap();
        source.set_status(&id, BookingStatus::Completed).unwrap();
        source.set_status(&id, BookingStatus::Cancelled).unwrap();
        assert!(matches!(
            source.set_status(&id, BookingStatus::Completed),
            Err(LedgerError::InvalidState(_))
        ));
        assert!(matches!(
            source.set_status(&BookingId::new("nope"), BookingStatus::Cancelled),
            Err(LedgerError::NotFound { .. })
        ));
    }
}
