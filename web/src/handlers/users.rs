//! Per-user ledger endpoints.
//!
//! - `GET  /api/v1/users/:user_id/balance`
//! - `GET  /api/v1/users/:user_id/awards`
//! - `POST /api/v1/users/:user_id/enroll`
//! - `POST /api/v1/users/:user_id/reconcile`
//! - `POST /api/v1/users/:user_id/redeem-check`

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use salon_loyalty_core::{AwardEvent, BalanceView, Money, ReconciliationReport, UserId};
use salon_loyalty_runtime::{AwardReceipt, RedemptionDecision};
use serde::Deserialize;

/// Coins, points per salon and their total.
///
/// ```bash
/// curl http://localhost:8080/api/v1/users/u-1/balance
/// ```
///
/// ```json
/// { "coins": 60, "points_by_salon": { "s-1": 10 }, "total": 70 }
/// ```
pub async fn get_balance(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<BalanceView>, AppError> {
    let balance = state.ledger.get_balance(&UserId::new(user_id)).await?;
    Ok(Json(balance))
}

/// The user's award log, oldest first.
pub async fn award_log(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<AwardEvent>>, AppError> {
    let events = state.ledger.award_log(&UserId::new(user_id)).await?;
    Ok(Json(events))
}

/// Record the signup bonus. Repeating the call writes nothing.
pub async fn enroll(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<AwardReceipt>, AppError> {
    let receipt = state.ledger.enroll(&UserId::new(user_id)).await?;
    Ok(Json(receipt))
}

/// Backfill missing awards.
///
/// On a mid-scan failure the error body carries `awards_fixed`.
pub async fn reconcile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ReconciliationReport>, AppError> {
    let report = state.ledger.reconcile(&UserId::new(user_id)).await?;
    Ok(Json(report))
}

/// Body of `POST /redeem-check`.
#[derive(Debug, Deserialize)]
pub struct RedeemCheckRequest {
    /// Points the customer wants to spend
    pub requested_points: i64,
    /// Booking total in cents
    pub booking_total_cents: i64,
}

/// How many points may be spent on a booking.
///
/// `requested_points` is capped by the redemption gate and never rejected:
/// a negative request yields `allowed_points = 0`. A negative
/// `booking_total_cents` is not a price and gets `400 BAD_REQUEST`.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/v1/users/u-1/redeem-check \
///   -H 'content-type: application/json' \
///   -d '{"requested_points": 200, "booking_total_cents": 10000}'
/// ```
pub async fn redeem_check(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<RedeemCheckRequest>,
) -> Result<Json<RedemptionDecision>, AppError> {
    if request.booking_total_cents < 0 {
        return Err(AppError::bad_request("booking_total_cents must not be negative"));
    }

    let decision = state
        .ledger
        .redeem_check(
            &UserId::new(user_id),
            request.requested_points,
            Money::from_cents(request.booking_total_cents),
        )
        .await?;
    Ok(Json(decision))
}
