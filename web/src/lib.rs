//! HTTP surface for the salon loyalty ledger.
//!
//! Thin axum handlers over [`LoyaltyLedger`](salon_loyalty_runtime::LoyaltyLedger):
//! parse the path and body, call the ledger, map [`AppError`] to a status.
//!
//! # Routes
//!
//! ```text
//! GET  /health
//! GET  /metrics
//! GET  /api/v1/users/:user_id/balance
//! GET  /api/v1/users/:user_id/awards
//! POST /api/v1/users/:user_id/enroll
//! POST /api/v1/users/:user_id/reconcile
//! POST /api/v1/users/:user_id/redeem-check
//! POST /api/v1/bookings/:booking_id/award
//! POST /api/v1/bookings/:booking_id/status-changed
//! ```
//!
//! # Example
//!
//! ```ignore
//! use salon_loyalty_web::{AppState, build_router};
//!
//! let app = build_router(AppState::new(ledger).with_metrics(exporter));
//! axum::serve(listener, app).await?;
//! ```

#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

pub use error::AppError;
pub use middleware::{CORRELATION_ID_HEADER, CorrelationId};
pub use state::AppState;

use axum::{
    Router,
    routing::{get, post},
};
use handlers::{bookings, health, users};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Build the complete router: health, metrics and the `/api/v1` routes,
/// wrapped in request tracing and correlation ids.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/users/:user_id/balance", get(users::get_balance))
        .route("/users/:user_id/awards", get(users::award_log))
        .route("/users/:user_id/enroll", post(users::enroll))
        .route("/users/:user_id/reconcile", post(users::reconcile))
        .route("/users/:user_id/redeem-check", post(users::redeem_check))
        .route("/bookings/:booking_id/award", post(bookings::award))
        .route(
            "/bookings/:booking_id/status-changed",
            post(bookings::status_changed),
        );

    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .nest("/api/v1", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::correlation_id))
                .layer(TraceLayer::new_for_http()),
        )
        .with_state(state)
}
