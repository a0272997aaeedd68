//! Ledger store trait and the admission rule every store enforces.
//!
//! # Design
//!
//! The award log is append-only and is the single source of truth. The store
//! trait is deliberately small:
//!
//! - Append one event, atomically checking its idempotency key
//! - Load a user's events in append order
//! - Read a user's balance (a fold over the log, or a cache kept equal to it)
//!
//! # Implementations
//!
//! - `PostgresLedgerStore` (in `salon-loyalty-postgres`): production store,
//!   same-key appends serialized with a transaction-scoped advisory lock
//! - `InMemoryLedgerStore` (in `salon-loyalty-testing`): fast, deterministic
//!   tests, with an incrementally maintained balance cache
//!
//! # Admission rule
//!
//! Per [`AwardKey`] the log is a sequence of credits and reversals. A key is
//! *active* when its latest entry is a credit. A credit is admitted only for an
//! inactive key, a reversal only for an active one. Anything else is
//! [`AppendOutcome::RejectedDuplicate`], which is an answer, not an error.

use crate::award::{AwardEvent, AwardKey, AwardReason};
use crate::balance::Balance;
use crate::error::LedgerError;
use crate::ids::{BookingId, UserId};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`LedgerStore`] methods.
pub type LedgerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, LedgerError>> + Send + 'a>>;

/// Result of an append attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The event was written to the log.
    Accepted,
    /// The key already holds an active credit (or, for a reversal, holds
    /// none). Nothing was written.
    RejectedDuplicate,
}

impl AppendOutcome {
    /// Whether the event was written.
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// State of a single idempotency key, folded from its entries in order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyState {
    /// Latest entry is a credit
    pub active: bool,
    /// Amount of the latest credit (what a reversal must negate)
    pub credited_amount: i64,
}

impl KeyState {
    /// Fold a key's entries, given in append order.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = (AwardReason, i64)>) -> Self {
        let mut state = Self::default();
        for (reason, amount) in entries {
            state.record(reason, amount);
        }
        state
    }

    /// Whether an entry with `reason` may be appended now.
    #[must_use]
    pub const fn admits(&self, reason: AwardReason) -> bool {
        if reason.is_credit() {
            !self.active
        } else {
            self.active
        }
    }

    /// Record an appended entry.
    pub const fn record(&mut self, reason: AwardReason, amount: i64) {
        if reason.is_credit() {
            self.active = true;
            self.credited_amount = amount;
        } else {
            self.active = false;
            self.credited_amount = 0;
        }
    }
}

/// Per-key view of a log, used by stores to admit appends and by the
/// reconciliation scanner to find missing awards.
#[derive(Clone, Debug, Default)]
pub struct AwardIndex {
    keys: HashMap<AwardKey, KeyState>,
}

impl AwardIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from events in append order.
    #[must_use]
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a AwardEvent>) -> Self {
        let mut index = Self::new();
        for event in events {
            index.record(event);
        }
        index
    }

    /// State of `key` (inactive when never seen).
    #[must_use]
    pub fn state(&self, key: &AwardKey) -> KeyState {
        self.keys.get(key).copied().unwrap_or_default()
    }

    /// Whether `event` may be appended now.
    #[must_use]
    pub fn admits(&self, event: &AwardEvent) -> bool {
        self.state(&event.key()).admits(event.reason)
    }

    /// Record an appended event.
    pub fn record(&mut self, event: &AwardEvent) {
        self.keys
            .entry(event.key())
            .or_default()
            .record(event.reason, event.amount);
    }

    /// Active keys that belong to `booking_id`, with their credited amounts.
    #[must_use]
    pub fn active_for_booking(&self, booking_id: &BookingId) -> Vec<(AwardKey, i64)> {
        let mut active: Vec<(AwardKey, i64)> = self
            .keys
            .iter()
            .filter(|(key, state)| state.active && key.booking_id.as_ref() == Some(booking_id))
            .map(|(key, state)| (key.clone(), state.credited_amount))
            .collect();
        active.sort_by(|a, b| a.0.cmp(&b.0));
        active
    }
}

/// Durable storage for the award log.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; appends for different keys may run
/// concurrently, appends for the same key must serialize on the admission
/// check.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of
/// `async fn` so the ledger service can hold an `Arc<dyn LedgerStore>`.
pub trait LedgerStore: Send + Sync {
    /// Append one event if its key admits it.
    ///
    /// The admission check and the insert happen atomically.
    ///
    /// # Errors
    ///
    /// - `TransientStoreFailure`: the store is unreachable (safe to retry)
    /// - `InvalidState`: the event fails [`AwardEvent::validate`]
    /// - `Storage`: permanent store failure
    fn append(&self, event: AwardEvent) -> LedgerFuture<'_, AppendOutcome>;

    /// Load all events of `user_id`, oldest first.
    ///
    /// A user with no history yields an empty vector, not an error.
    ///
    /// # Errors
    ///
    /// - `TransientStoreFailure`: the store is unreachable
    /// - `Storage`: a stored row could not be decoded
    fn load_events(&self, user_id: UserId) -> LedgerFuture<'_, Vec<AwardEvent>>;

    /// Balance of `user_id`, equal to `Balance::fold(load_events(user_id))`.
    ///
    /// # Errors
    ///
    /// - `TransientStoreFailure`: the store is unreachable
    fn read_balance(&self, user_id: UserId) -> LedgerFuture<'_, Balance>;
}
