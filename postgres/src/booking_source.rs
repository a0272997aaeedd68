//! Read-only view of the booking service's `bookings` table.
//!
//! Expected columns: `id`, `salon_id`, `user_id` (text), `final_price_cents`
//! (bigint), `status` (text) and `completed_at` (nullable timestamptz). The
//! ledger never writes to this table.

use crate::error::map_sqlx_error;
use salon_loyalty_core::booking::BookingFuture;
use salon_loyalty_core::{
    Booking, BookingId, BookingSource, BookingStatus, LedgerError, Money, SalonId, UserId,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// [`BookingSource`] over a shared `PostgreSQL` database.
#[derive(Clone, Debug)]
pub struct PostgresBookingSource {
    pool: PgPool,
}

impl PostgresBookingSource {
    /// Use an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn completed_inner(&self, user_id: UserId) -> Result<Vec<Booking>, LedgerError> {
        let rows = sqlx::query(
            "SELECT id, salon_id, user_id, final_price_cents, status, completed_at
             FROM bookings
             WHERE user_id = $1 AND status = 'completed'
             ORDER BY completed_at, id",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        tracing::debug!(user_id = %user_id, count = rows.len(), "Loaded completed bookings");
        rows.iter().map(row_to_booking).collect()
    }

    async fn get_inner(&self, booking_id: BookingId) -> Result<Option<Booking>, LedgerError> {
        let row = sqlx::query(
            "SELECT id, salon_id, user_id, final_price_cents, status, completed_at
             FROM bookings
             WHERE id = $1",
        )
        .bind(booking_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(row_to_booking).transpose()
    }
}

fn row_to_booking(row: &PgRow) -> Result<Booking, LedgerError> {
    let id: String = row.try_get("id").map_err(map_sqlx_error)?;
    let salon_id: String = row.try_get("salon_id").map_err(map_sqlx_error)?;
    let user_id: String = row.try_get("user_id").map_err(map_sqlx_error)?;
    let status: String = row.try_get("status").map_err(map_sqlx_error)?;

    Ok(Booking {
        id: BookingId::new(id),
        salon_id: SalonId::new(salon_id),
        user_id: UserId::new(user_id),
        final_price: Money::from_cents(row.try_get("final_price_cents").map_err(map_sqlx_error)?),
        status: BookingStatus::parse(&status)?,
        completed_at: row.try_get("completed_at").map_err(map_sqlx_error)?,
    })
}

impl BookingSource for PostgresBookingSource {
    fn list_completed_bookings(&self, user_id: UserId) -> BookingFuture<'_, Vec<Booking>> {
        Box::pin(self.completed_inner(user_id))
    }

    fn get_booking(&self, booking_id: BookingId) -> BookingFuture<'_, Option<Booking>> {
        Box::pin(self.get_inner(booking_id))
    }
}
