//! Error taxonomy for ledger operations.
//!
//! A duplicate award is deliberately absent: the store answers it with
//! [`AppendOutcome::RejectedDuplicate`](crate::ledger::AppendOutcome), which
//! makes award-on-completion safe to retry.

use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Unknown user or booking. Surfaced to the caller, never retried.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity that was looked up ("booking", "user").
        entity: &'static str,
        /// The identifier that was not found.
        id: String,
    },

    /// The ledger store or booking source could not be reached.
    ///
    /// Retried with bounded backoff at the call site.
    #[error("Transient store failure: {0}")]
    TransientStoreFailure(String),

    /// No earning rule is configured.
    ///
    /// Awards fail loudly rather than guessing a rate.
    #[error("Earning rule configuration missing: {0}")]
    ConfigMissing(String),

    /// The operation does not apply to the current state (e.g. reversing a
    /// booking that is not cancelled).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Permanent storage failure (constraint violation, corrupt row, ...).
    #[error("Storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Shorthand for [`LedgerError::NotFound`] on a booking.
    #[must_use]
    pub fn booking_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "booking",
            id: id.to_string(),
        }
    }

    /// Whether retrying the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStoreFailure(_))
    }
}
