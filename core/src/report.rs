//! Reconciliation report.

use crate::award::AwardEvent;
use crate::ids::UserId;
use serde::{Deserialize, Serialize};

/// Summary of one reconciliation scan. Never persisted: the corrections it
/// lists are the only lasting effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// User whose ledger was scanned
    pub user_id: UserId,
    /// Completed bookings replayed through the rule engine
    pub bookings_scanned: usize,
    /// Bookings with at least one award missing from the log
    pub awards_missing: usize,
    /// Bookings for which at least one correction landed
    pub awards_fixed: usize,
    /// Existing awards whose amount differs from what the current rule yields;
    /// reported only, never rewritten
    pub amount_mismatches: usize,
    /// Correction events appended by this scan
    pub corrections: Vec<AwardEvent>,
}

impl ReconciliationReport {
    /// Empty report for `user_id`.
    #[must_use]
    pub const fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            bookings_scanned: 0,
            awards_missing: 0,
            awards_fixed: 0,
            amount_mismatches: 0,
            corrections: Vec::new(),
        }
    }

    /// Whether the scan found the ledger already consistent.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.awards_missing == 0
    }

    /// Sum of all correction amounts.
    #[must_use]
    pub fn corrected_amount(&self) -> i64 {
        self.corrections.iter().map(|event| event.amount).sum()
    }
}
