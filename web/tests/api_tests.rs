//! Handler tests over the in-memory stores.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use salon_loyalty_core::{
    BookingId, BookingStatus, EarningRule, LedgerStore, Money, StaticEarningRule,
};
use salon_loyalty_runtime::{LedgerEnvironment, LoyaltyLedger, RetryPolicy};
use salon_loyalty_testing::fixtures::{booking, completed_booking, standard_rule};
use salon_loyalty_testing::{
    FlakyLedgerStore, InMemoryBookingSource, InMemoryLedgerStore, SequentialIdGenerator,
    test_clock,
};
use salon_loyalty_web::{AppState, CORRELATION_ID_HEADER, build_router};
use serde_json::{Value, json};
use std::sync::Arc;

fn server(
    store: Arc<dyn LedgerStore>,
    bookings: &InMemoryBookingSource,
    rule: Option<EarningRule>,
) -> TestServer {
    let ledger = LoyaltyLedger::new(
        store,
        Arc::new(bookings.clone()),
        Arc::new(StaticEarningRule::from(rule)),
    )
    .with_environment(LedgerEnvironment {
        clock: Arc::new(test_clock()),
        ids: Arc::new(SequentialIdGenerator::new()),
    })
    .with_retry_policy(RetryPolicy::no_retry());

    TestServer::new(build_router(AppState::new(ledger))).expect("failed to start test server")
}

fn standard_server(bookings: &InMemoryBookingSource) -> TestServer {
    server(
        Arc::new(InMemoryLedgerStore::new()),
        bookings,
        Some(standard_rule()),
    )
}

#[tokio::test]
async fn health_returns_ok() {
    let server = standard_server(&InMemoryBookingSource::new());
    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "ok");
}

#[tokio::test]
async fn metrics_endpoint_serves_text() {
    let server = standard_server(&InMemoryBookingSource::new());
    let response = server.get("/metrics").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn correlation_id_is_echoed() {
    let server = standard_server(&InMemoryBookingSource::new());
    let id = "7f1c8f9e-4a55-4c38-9a8f-0c3c6fd8a2b1";
    let response = server
        .get("/health")
        .add_header(
            HeaderName::from_static(CORRELATION_ID_HEADER),
            HeaderValue::from_static(id),
        )
        .await;
    assert_eq!(
        response.header(HeaderName::from_static(CORRELATION_ID_HEADER)),
        id
    );
}

#[tokio::test]
async fn award_then_balance() {
    let bookings = InMemoryBookingSource::with_bookings([completed_booking("b-1", "u-1", "s-1", 100)]);
    let server = standard_server(&bookings);

    let response = server.post("/api/v1/bookings/b-1/award").await;
    response.assert_status_ok();
    let receipt: Value = response.json();
    assert_eq!(receipt["booking_id"], "b-1");
    assert_eq!(receipt["accepted"].as_array().unwrap().len(), 2);

    let balance: Value = server.get("/api/v1/users/u-1/balance").await.json();
    assert_eq!(balance["coins"], 60);
    assert_eq!(balance["points_by_salon"]["s-1"], 10);
    assert_eq!(balance["total"], 70);
}

#[tokio::test]
async fn repeated_award_reports_duplicates() {
    let bookings = InMemoryBookingSource::with_bookings([completed_booking("b-1", "u-1", "s-1", 100)]);
    let server = standard_server(&bookings);

    server.post("/api/v1/bookings/b-1/award").await.assert_status_ok();
    let response = server.post("/api/v1/bookings/b-1/award").await;
    response.assert_status_ok();

    let receipt: Value = response.json();
    assert!(receipt["accepted"].as_array().unwrap().is_empty());
    assert_eq!(receipt["rejected_duplicate"].as_array().unwrap().len(), 2);

    let log: Value = server.get("/api/v1/users/u-1/awards").await.json();
    assert_eq!(log.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn unknown_booking_is_not_found() {
    let server = standard_server(&InMemoryBookingSource::new());
    let response = server.post("/api/v1/bookings/missing/award").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn open_booking_is_conflict() {
    let bookings = InMemoryBookingSource::with_bookings([booking(
        "b-1",
        "u-1",
        "s-1",
        100,
        BookingStatus::Confirmed,
    )]);
    let server = standard_server(&bookings);

    let response = server.post("/api/v1/bookings/b-1/award").await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn missing_rule_fails_loudly() {
    let bookings = InMemoryBookingSource::with_bookings([completed_booking("b-1", "u-1", "s-1", 100)]);
    let server = server(Arc::new(InMemoryLedgerStore::new()), &bookings, None);

    let response = server.post("/api/v1/bookings/b-1/award").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["code"], "CONFIG_MISSING");

    // Reads still work without a rule.
    server.get("/api/v1/users/u-1/balance").await.assert_status_ok();
}

#[tokio::test]
async fn enroll_is_idempotent() {
    let server = standard_server(&InMemoryBookingSource::new());

    let first: Value = server.post("/api/v1/users/u-1/enroll").await.json();
    assert_eq!(first["accepted"].as_array().unwrap().len(), 1);

    let second: Value = server.post("/api/v1/users/u-1/enroll").await.json();
    assert!(second["accepted"].as_array().unwrap().is_empty());

    let balance: Value = server.get("/api/v1/users/u-1/balance").await.json();
    assert_eq!(balance["coins"], 50);
}

#[tokio::test]
async fn reconcile_backfills_missing_award() {
    let bookings = InMemoryBookingSource::with_bookings([
        completed_booking("b-1", "u-1", "s-1", 100),
        completed_booking("b-2", "u-1", "s-1", 50),
    ]);
    let server = standard_server(&bookings);
    server.post("/api/v1/bookings/b-1/award").await.assert_status_ok();

    let report: Value = server.post("/api/v1/users/u-1/reconcile").await.json();
    assert_eq!(report["bookings_scanned"], 2);
    assert_eq!(report["awards_fixed"], 1);
    assert_eq!(report["corrections"].as_array().unwrap().len(), 2);

    let again: Value = server.post("/api/v1/users/u-1/reconcile").await.json();
    assert_eq!(again["awards_fixed"], 0);
}

#[tokio::test]
async fn interrupted_reconcile_reports_progress() {
    let bookings = InMemoryBookingSource::with_bookings([
        completed_booking("b-1", "u-1", "s-1", 100),
        completed_booking("b-2", "u-1", "s-1", 50),
    ]);
    let store = FlakyLedgerStore::new(InMemoryLedgerStore::new());
    store.allow_appends(1);
    let server = server(Arc::new(store.clone()), &bookings, Some(standard_rule()));

    let response = server.post("/api/v1/users/u-1/reconcile").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
    assert_eq!(body["awards_fixed"], 1);
    assert_eq!(store.inner().len(), 1);
}

#[tokio::test]
async fn redeem_check_caps_at_discount() {
    let bookings = InMemoryBookingSource::with_bookings([completed_booking("b-1", "u-1", "s-1", 1000)]);
    let server = standard_server(&bookings);
    server.post("/api/v1/bookings/b-1/award").await.assert_status_ok();

    let response = server
        .post("/api/v1/users/u-1/redeem-check")
        .json(&json!({ "requested_points": 200, "booking_total_cents": 10_000 }))
        .await;
    response.assert_status_ok();
    let decision: Value = response.json();
    assert_eq!(decision["allowed"], true);
    assert_eq!(decision["allowed_points"], 30);
    assert_eq!(decision["max_allowed"], 30);
}

#[tokio::test]
async fn redeem_check_rejects_negative_total() {
    let server = standard_server(&InMemoryBookingSource::new());
    let response = server
        .post("/api/v1/users/u-1/redeem-check")
        .json(&json!({ "requested_points": 10, "booking_total_cents": -1 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn redeem_check_caps_negative_request_at_zero() {
    let bookings = InMemoryBookingSource::with_bookings([completed_booking("b-1", "u-1", "s-1", 1000)]);
    let server = standard_server(&bookings);
    server.post("/api/v1/bookings/b-1/award").await.assert_status_ok();

    let response = server
        .post("/api/v1/users/u-1/redeem-check")
        .json(&json!({ "requested_points": -5, "booking_total_cents": 10_000 }))
        .await;
    response.assert_status_ok();
    let decision: Value = response.json();
    assert_eq!(decision["allowed"], true);
    assert_eq!(decision["allowed_points"], 0);
    assert_eq!(decision["max_allowed"], 30);
}

#[tokio::test]
async fn oversized_booking_is_refused_and_balance_stays_readable() {
    let mut huge = completed_booking("b-1", "u-1", "s-1", 0);
    huge.final_price = Money::from_cents(i64::MAX);
    let bookings = InMemoryBookingSource::with_bookings([huge]);
    let server = server(
        Arc::new(InMemoryLedgerStore::new()),
        &bookings,
        Some(EarningRule::new(Money::from_cents(1)).with_signup_bonus(50)),
    );

    let response = server.post("/api/v1/bookings/b-1/award").await;
    response.assert_status(StatusCode::CONFLICT);

    let balance = server.get("/api/v1/users/u-1/balance").await;
    balance.assert_status_ok();
    let body: Value = balance.json();
    assert_eq!(body["total"], 50);
}

#[tokio::test]
async fn status_change_awards_then_reverses() {
    let bookings = InMemoryBookingSource::with_bookings([completed_booking("b-1", "u-1", "s-1", 100)]);
    let server = standard_server(&bookings);

    let awarded: Value = server.post("/api/v1/bookings/b-1/status-changed").await.json();
    assert_eq!(awarded["action"], "awarded");

    bookings
        .set_status(&BookingId::new("b-1"), BookingStatus::Cancelled)
        .unwrap();
    let reversed: Value = server.post("/api/v1/bookings/b-1/status-changed").await.json();
    assert_eq!(reversed["action"], "reversed");
    assert_eq!(reversed["accepted"].as_array().unwrap().len(), 2);

    let balance: Value = server.get("/api/v1/users/u-1/balance").await.json();
    assert_eq!(balance["total"], 50);
}

#[tokio::test]
async fn status_change_ignores_open_booking() {
    let bookings = InMemoryBookingSource::with_bookings([booking(
        "b-1",
        "u-1",
        "s-1",
        100,
        BookingStatus::Pending,
    )]);
    let server = standard_server(&bookings);

    let body: Value = server.post("/api/v1/bookings/b-1/status-changed").await.json();
    assert_eq!(body["action"], "ignored");
    assert_eq!(body["status"], "pending");
}
