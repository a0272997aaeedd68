//! Reconciliation scanner.
//!
//! Replays a user's completed bookings through the rule engine and appends a
//! `correction` for every expected award whose key is not active in the log.
//! Each correction is its own atomic append, so a scan that fails midway
//! leaves the corrections that landed and reports them; running it again
//! picks up where it stopped.

use crate::LedgerEnvironment;
use crate::metrics::LedgerMetrics;
use crate::retry::{RetryPolicy, retry_transient};
use salon_loyalty_core::rule::evaluate;
use salon_loyalty_core::{
    AppendOutcome, AwardIndex, AwardReason, Booking, BookingSource, EarningRule, LedgerError,
    LedgerStore, ReconciliationReport, UserId,
};
use thiserror::Error;

/// A scan that stopped on an error after applying some corrections.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "reconciliation for {} stopped after {} correction(s): {source}",
    .report.user_id,
    .report.corrections.len()
)]
pub struct ReconciliationError {
    /// What the scan managed before failing
    pub report: ReconciliationReport,
    /// Why it stopped
    #[source]
    pub source: LedgerError,
}

impl ReconciliationError {
    /// Wrap `source` with the partial `report`.
    #[must_use]
    pub const fn new(report: ReconciliationReport, source: LedgerError) -> Self {
        Self { report, source }
    }

    /// Failure before anything was scanned.
    #[must_use]
    pub const fn before_scan(user_id: UserId, source: LedgerError) -> Self {
        Self::new(ReconciliationReport::new(user_id), source)
    }
}

/// One reconciliation pass over one user's ledger.
///
/// The caller holds the user's reconciliation lock for the lifetime of the
/// scanner.
pub struct ReconciliationScanner<'a> {
    pub(crate) store: &'a dyn LedgerStore,
    pub(crate) bookings: &'a dyn BookingSource,
    pub(crate) rule: &'a EarningRule,
    pub(crate) env: &'a LedgerEnvironment,
    pub(crate) retry: &'a RetryPolicy,
}

#[derive(Default)]
struct BookingOutcome {
    missing: bool,
    fixed: bool,
}

impl ReconciliationScanner<'_> {
    /// Scan `user_id`'s completed bookings and backfill missing awards.
    ///
    /// # Errors
    ///
    /// Returns [`ReconciliationError`] carrying the partial report when a
    /// store or source call fails after retries.
    pub async fn scan(&self, user_id: &UserId) -> Result<ReconciliationReport, ReconciliationError> {
        let mut report = ReconciliationReport::new(user_id.clone());

        let bookings = match retry_transient(self.retry, || {
            self.bookings.list_completed_bookings(user_id.clone())
        })
        .await
        {
            Ok(bookings) => bookings,
            Err(e) => return Err(ReconciliationError::new(report, e)),
        };
        let events = match retry_transient(self.retry, || self.store.load_events(user_id.clone())).await {
            Ok(events) => events,
            Err(e) => return Err(ReconciliationError::new(report, e)),
        };
        let mut index = AwardIndex::from_events(&events);

        for booking in bookings
            .iter()
            .filter(|b| &b.user_id == user_id && b.is_completed())
        {
            report.bookings_scanned += 1;

            let mut outcome = BookingOutcome::default();
            let result = self
                .scan_booking(booking, &mut index, &mut report, &mut outcome)
                .await;

            if outcome.missing {
                report.awards_missing += 1;
            }
            if outcome.fixed {
                report.awards_fixed += 1;
            }
            if let Err(e) = result {
                tracing::warn!(
                    user_id = %user_id,
                    booking_id = %booking.id,
                    awards_fixed = report.awards_fixed,
                    error = %e,
                    "Reconciliation interrupted"
                );
                return Err(ReconciliationError::new(report, e));
            }
        }

        Ok(report)
    }

    async fn scan_booking(
        &self,
        booking: &Booking,
        index: &mut AwardIndex,
        report: &mut ReconciliationReport,
        outcome: &mut BookingOutcome,
    ) -> Result<(), LedgerError> {
        let awards = match evaluate(self.rule, booking) {
            Ok(awards) => awards,
            Err(e) => {
                tracing::warn!(booking_id = %booking.id, error = %e, "Booking skipped, award above ceiling");
                return Ok(());
            }
        };
        for award in awards {
            let state = index.state(&award.key);
            if state.active {
                if state.credited_amount != award.amount {
                    report.amount_mismatches += 1;
                    tracing::debug!(
                        booking_id = %booking.id,
                        currency = %award.key.currency,
                        recorded = state.credited_amount,
                        expected = award.amount,
                        "Award amount differs from current rule"
                    );
                }
                continue;
            }

            outcome.missing = true;
            let correction =
                award.into_event(self.env.ids.next_id(), self.env.clock.now(), AwardReason::Correction);

            match retry_transient(self.retry, || self.store.append(correction.clone())).await? {
                AppendOutcome::Accepted => {
                    LedgerMetrics::record_append(correction.currency, correction.reason);
                    tracing::info!(
                        booking_id = %booking.id,
                        currency = %correction.currency,
                        amount = correction.amount,
                        "Correction appended"
                    );
                    index.record(&correction);
                    report.corrections.push(correction);
                    outcome.fixed = true;
                }
                AppendOutcome::RejectedDuplicate => {
                    // A concurrent award landed between the log read and this append.
                    LedgerMetrics::record_duplicate();
                    index.record(&correction);
                }
            }
        }
        Ok(())
    }
}
