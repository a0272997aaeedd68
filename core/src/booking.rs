//! Bookings as observed by the ledger, and the source they come from.
//!
//! The booking record belongs to the external booking service. The ledger only
//! reads it: the status field decides whether an award is due, and the final
//! price decides how much.

use crate::error::LedgerError;
use crate::ids::{BookingId, SalonId, UserId};
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Lifecycle status of a booking.
///
/// ```text
/// pending ──► confirmed ──► completed ──► cancelled
///    │            │                          ▲
///    └────────────┴──────────────────────────┘
/// ```
///
/// `cancelled` is terminal. `completed → cancelled` is the cancellation after
/// completion case, which the ledger answers with reversal entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Requested, not yet accepted by the salon
    Pending,
    /// Accepted by the salon
    Confirmed,
    /// Service delivered; earns loyalty awards
    Completed,
    /// Called off; terminal
    Cancelled,
}

impl BookingStatus {
    /// Convert status to its wire/database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse status from its wire/database representation.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] if the string is not a known status.
    pub fn parse(s: &str) -> Result<Self, LedgerError> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(LedgerError::Storage(format!("Invalid booking status: {s}"))),
        }
    }

    /// Whether the booking may move from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed | Self::Cancelled)
                | (Self::Confirmed, Self::Completed | Self::Cancelled)
                | (Self::Completed, Self::Cancelled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A booking record as delivered by the [`BookingSource`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking identifier
    pub id: BookingId,
    /// Salon that delivered the service
    pub salon_id: SalonId,
    /// Customer who made the booking
    pub user_id: UserId,
    /// Price actually charged, after discounts
    pub final_price: Money,
    /// Current status
    pub status: BookingStatus,
    /// When the booking was completed, if it was
    pub completed_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// Whether the booking is currently `completed`.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == BookingStatus::Completed
    }
}

/// Boxed future returned by [`BookingSource`] methods.
pub type BookingFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, LedgerError>> + Send + 'a>>;

/// Read access to the external booking service.
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so the ledger can hold an
/// `Arc<dyn BookingSource>`.
pub trait BookingSource: Send + Sync {
    /// Every booking of `user_id` whose status is `completed`.
    ///
    /// # Errors
    ///
    /// - `TransientStoreFailure`: the booking service is unreachable
    fn list_completed_bookings(&self, user_id: UserId) -> BookingFuture<'_, Vec<Booking>>;

    /// Look up a single booking.
    ///
    /// Returns `Ok(None)` for an unknown id.
    ///
    /// # Errors
    ///
    /// - `TransientStoreFailure`: the booking service is unreachable
    fn get_booking(&self, booking_id: BookingId) -> BookingFuture<'_, Option<Booking>>;
}
