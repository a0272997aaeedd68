//! `PostgreSQL` storage for the loyalty ledger.
//!
//! - [`PostgresLedgerStore`]: the award log in `award_events`, with same-key
//!   appends serialized by a transaction-scoped advisory lock
//! - [`PostgresBookingSource`]: reads the booking service's `bookings` table
//!
//! Queries use the runtime `sqlx::query` API, so building this crate does not
//! need a live database.
//!
//! # Example
//!
//! ```ignore
//! use salon_loyalty_postgres::{connect, PostgresLedgerStore};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = connect("postgres://localhost/salon_loyalty", 10, 30).await?;
//!     let store = PostgresLedgerStore::from_pool(pool);
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

mod booking_source;
mod error;
mod ledger_store;

pub use booking_source::PostgresBookingSource;
pub use error::map_sqlx_error;
pub use ledger_store::PostgresLedgerStore;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

/// Embedded schema migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Open a connection pool.
///
/// # Errors
///
/// Returns the `sqlx` error when the database cannot be reached within
/// `connect_timeout_secs`.
pub async fn connect(
    url: &str,
    max_connections: u32,
    connect_timeout_secs: u64,
) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(connect_timeout_secs))
        .connect(url)
        .await?;
    tracing::info!(max_connections, "Connected to PostgreSQL");
    Ok(pool)
}
