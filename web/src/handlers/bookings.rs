//! Booking-triggered endpoints, called by the booking service.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use salon_loyalty_core::BookingId;
use salon_loyalty_runtime::{AwardReceipt, StatusChangeOutcome};

/// Award a completed booking.
///
/// Safe to call repeatedly: once awarded, later calls answer with the keys
/// in `rejected_duplicate` and write nothing.
///
/// ```text
/// POST /api/v1/bookings/:booking_id/award
/// ```
pub async fn award(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
) -> Result<Json<AwardReceipt>, AppError> {
    let receipt = state
        .ledger
        .award_for_booking(&BookingId::new(booking_id))
        .await?;
    Ok(Json(receipt))
}

/// React to a booking status change: award on completion, reverse on
/// cancellation, ignore anything else.
///
/// ```text
/// POST /api/v1/bookings/:booking_id/status-changed
/// ```
pub async fn status_changed(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
) -> Result<Json<StatusChangeOutcome>, AppError> {
    let outcome = state
        .ledger
        .handle_status_change(&BookingId::new(booking_id))
        .await?;
    Ok(Json(outcome))
}
