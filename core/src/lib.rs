//! # Salon Loyalty Core
//!
//! Domain types, pure rules and storage traits for the booking-triggered
//! loyalty ledger.
//!
//! Every user earns platform-wide **coins** and per-salon **points** when a
//! booking completes. Awards are appended to an append-only log, and balances
//! are folds over that log. A reconciliation pass (in `salon-loyalty-runtime`)
//! replays booking history to backfill awards the log is missing.
//!
//! ## Core Concepts
//!
//! - **Award event**: immutable log entry ([`award::AwardEvent`])
//! - **Award key**: idempotency key; one active credit per key ([`award::AwardKey`])
//! - **Rule engine**: pure `booking → awards` mapping ([`rule::evaluate`])
//! - **Ledger store**: durable log with atomic admission ([`ledger::LedgerStore`])
//! - **Booking source**: read side of the external booking service ([`booking::BookingSource`])
//!
//! ## Architecture Principles
//!
//! - The log is the source of truth; balances are derived
//! - Corrections and reversals are new entries, never edits
//! - Duplicate awards are an outcome, not an error
//! - Dependencies (clock, ids, stores) are injected via traits

pub mod award;
pub mod balance;
pub mod booking;
pub mod environment;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod money;
pub mod report;
pub mod rule;

// Re-export commonly used types
pub use award::{AwardEvent, AwardKey, AwardReason, Currency, MAX_AWARD_AMOUNT, PendingAward};
pub use balance::{Balance, BalanceView};
pub use booking::{Booking, BookingSource, BookingStatus};
pub use chrono::{DateTime, Utc};
pub use error::LedgerError;
pub use ids::{AwardEventId, BookingId, SalonId, UserId};
pub use ledger::{AppendOutcome, AwardIndex, LedgerStore};
pub use money::Money;
pub use report::ReconciliationReport;
pub use rule::{EarningRule, EarningRuleSource, StaticEarningRule};
