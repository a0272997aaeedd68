//! # Salon Loyalty Runtime
//!
//! The [`LoyaltyLedger`] service: awards on booking completion, balances,
//! enrollment, reversals, reconciliation and the redemption gate, on top of
//! the storage traits from `salon-loyalty-core`.
//!
//! ## Example
//!
//! ```ignore
//! use salon_loyalty_runtime::LoyaltyLedger;
//!
//! let ledger = LoyaltyLedger::new(store, bookings, rules)
//!     .with_retry_policy(config.retry.policy());
//!
//! ledger.award_for_booking(&booking_id).await?;
//! let balance = ledger.get_balance(&user_id).await?;
//! ```
//!
//! ## Failure model
//!
//! Every store and booking-source call goes through
//! [`retry::retry_transient`]. Appends are idempotent per award key, so a
//! retried or repeated award never double-credits.

use salon_loyalty_core::environment::{Clock, IdGenerator, SystemClock, UuidGenerator};
use salon_loyalty_core::rule::evaluate;
use salon_loyalty_core::{
    AppendOutcome, AwardEvent, AwardIndex, AwardKey, AwardReason, BalanceView, Booking, BookingId,
    BookingSource, BookingStatus, EarningRule, EarningRuleSource, LedgerError, LedgerStore, Money,
    PendingAward, ReconciliationReport, UserId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Environment variable configuration
pub mod config;

/// Per-user async locks
pub mod locks;

/// Prometheus metrics for observability
pub mod metrics;

/// Reconciliation scanner
pub mod reconcile;

/// Redemption gate
pub mod redemption;

/// Retry logic with exponential backoff
pub mod retry;

pub use config::{Config, ConfigError};
pub use reconcile::{ReconciliationError, ReconciliationScanner};
pub use redemption::RedemptionDecision;
pub use retry::RetryPolicy;

use locks::KeyedLocks;
use metrics::LedgerMetrics;
use retry::retry_transient;

/// Injected time and id sources.
#[derive(Clone)]
pub struct LedgerEnvironment {
    /// Timestamp source for new events
    pub clock: Arc<dyn Clock>,
    /// Id source for new events
    pub ids: Arc<dyn IdGenerator>,
}

impl Default for LedgerEnvironment {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidGenerator),
        }
    }
}

/// What an award, enrollment or reversal call appended.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardReceipt {
    /// Booking the call was about (absent for enrollment)
    pub booking_id: Option<BookingId>,
    /// Events written by this call
    pub accepted: Vec<AwardEvent>,
    /// Keys whose append was answered with `rejected_duplicate`
    pub rejected_duplicate: Vec<AwardKey>,
}

impl AwardReceipt {
    fn for_booking(booking_id: BookingId) -> Self {
        Self {
            booking_id: Some(booking_id),
            ..Self::default()
        }
    }

    /// Nothing was written because every key was already settled.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        self.accepted.is_empty() && !self.rejected_duplicate.is_empty()
    }

    /// Sum of the amounts written.
    #[must_use]
    pub fn total_amount(&self) -> i64 {
        self.accepted.iter().map(|event| event.amount).sum()
    }
}

/// Result of [`LoyaltyLedger::handle_status_change`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StatusChangeOutcome {
    /// The booking completed and was awarded
    Awarded(AwardReceipt),
    /// The booking was cancelled and its awards reversed
    Reversed(AwardReceipt),
    /// The status needs no ledger action
    Ignored {
        /// Status observed
        status: BookingStatus,
    },
}

/// The loyalty ledger service.
///
/// Cheap to share: wrap it in an `Arc` and hand it to every request handler.
pub struct LoyaltyLedger {
    store: Arc<dyn LedgerStore>,
    bookings: Arc<dyn BookingSource>,
    rules: Arc<dyn EarningRuleSource>,
    env: LedgerEnvironment,
    retry: RetryPolicy,
    reconcile_locks: KeyedLocks<UserId>,
}

impl LoyaltyLedger {
    /// Create a ledger with the system clock, random ids and the default
    /// retry policy.
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        bookings: Arc<dyn BookingSource>,
        rules: Arc<dyn EarningRuleSource>,
    ) -> Self {
        Self {
            store,
            bookings,
            rules,
            env: LedgerEnvironment::default(),
            retry: RetryPolicy::default(),
            reconcile_locks: KeyedLocks::new(),
        }
    }

    /// Replace the clock and id generator.
    #[must_use]
    pub fn with_environment(mut self, env: LedgerEnvironment) -> Self {
        self.env = env;
        self
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The earning rule in force.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ConfigMissing`] when no usable rule is configured.
    pub fn earning_rule(&self) -> Result<EarningRule, LedgerError> {
        let rule = self.rules.current().ok_or_else(|| {
            LedgerError::ConfigMissing("no earning rule configured".to_string())
        })?;
        rule.validate()?;
        Ok(rule)
    }

    fn configured_signup_bonus(&self) -> i64 {
        self.rules.current().map_or(0, |rule| rule.coin_signup_bonus)
    }

    /// Coins, points per salon and their total for `user_id`.
    ///
    /// Users without history get the configured signup bonus.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::TransientStoreFailure`] once retries are
    /// exhausted.
    pub async fn get_balance(&self, user_id: &UserId) -> Result<BalanceView, LedgerError> {
        let balance = retry_transient(&self.retry, || self.store.read_balance(user_id.clone())).await?;
        balance.into_view(self.configured_signup_bonus())
    }

    /// `coins + Σ points_by_salon` for `user_id`.
    ///
    /// # Errors
    ///
    /// See [`LoyaltyLedger::get_balance`].
    pub async fn total_points(&self, user_id: &UserId) -> Result<i64, LedgerError> {
        Ok(self.get_balance(user_id).await?.total)
    }

    /// The user's award log, oldest first.
    ///
    /// # Errors
    ///
    /// Returns store errors once retries are exhausted.
    pub async fn award_log(&self, user_id: &UserId) -> Result<Vec<AwardEvent>, LedgerError> {
        retry_transient(&self.retry, || self.store.load_events(user_id.clone())).await
    }

    /// Award a completed booking, looked up by id.
    ///
    /// Safe to call any number of times: repeated calls write nothing and
    /// report the keys as duplicates.
    ///
    /// # Errors
    ///
    /// - `NotFound`: unknown booking
    /// - `InvalidState`: the booking is not `completed`
    /// - `ConfigMissing`: no earning rule
    /// - `TransientStoreFailure`: store unreachable after retries
    #[tracing::instrument(skip_all, fields(booking_id = %booking_id))]
    pub async fn award_for_booking(&self, booking_id: &BookingId) -> Result<AwardReceipt, LedgerError> {
        let booking = self.fetch_booking(booking_id).await?;
        self.award_booking(&booking).await
    }

    /// Award an already fetched booking.
    ///
    /// # Errors
    ///
    /// See [`LoyaltyLedger::award_for_booking`].
    pub async fn award_booking(&self, booking: &Booking) -> Result<AwardReceipt, LedgerError> {
        if !booking.is_completed() {
            return Err(LedgerError::InvalidState(format!(
                "booking {} is {}, only completed bookings earn awards",
                booking.id, booking.status
            )));
        }
        let rule = self.earning_rule()?;

        let mut receipt = AwardReceipt::for_booking(booking.id.clone());
        for award in evaluate(&rule, booking)? {
            self.append_award(award, AwardReason::Earned, &mut receipt).await?;
        }

        tracing::info!(
            user_id = %booking.user_id,
            booking_id = %booking.id,
            accepted = receipt.accepted.len(),
            duplicates = receipt.rejected_duplicate.len(),
            "Booking awarded"
        );
        Ok(receipt)
    }

    /// Record the signup bonus for `user_id`.
    ///
    /// Idempotent per user; a configured bonus of zero records nothing.
    ///
    /// # Errors
    ///
    /// - `ConfigMissing`: no earning rule
    /// - `TransientStoreFailure`: store unreachable after retries
    #[tracing::instrument(skip_all, fields(user_id = %user_id))]
    pub async fn enroll(&self, user_id: &UserId) -> Result<AwardReceipt, LedgerError> {
        let rule = self.earning_rule()?;
        let mut receipt = AwardReceipt::default();
        if rule.coin_signup_bonus == 0 {
            tracing::debug!("Signup bonus is zero, nothing to record");
            return Ok(receipt);
        }

        let award = PendingAward {
            key: AwardKey::signup_bonus(user_id.clone()),
            amount: rule.coin_signup_bonus,
        };
        self.append_award(award, AwardReason::SignupBonus, &mut receipt)
            .await?;
        Ok(receipt)
    }

    /// Reverse every active award of a cancelled booking.
    ///
    /// Running it again appends nothing.
    ///
    /// # Errors
    ///
    /// - `NotFound`: unknown booking
    /// - `InvalidState`: the booking is not `cancelled`
    /// - `TransientStoreFailure`: store unreachable after retries
    #[tracing::instrument(skip_all, fields(booking_id = %booking_id))]
    pub async fn reverse_booking(&self, booking_id: &BookingId) -> Result<AwardReceipt, LedgerError> {
        let booking = self.fetch_booking(booking_id).await?;
        self.reverse_fetched(&booking).await
    }

    /// Reverse an already fetched booking.
    ///
    /// # Errors
    ///
    /// See [`LoyaltyLedger::reverse_booking`].
    pub async fn reverse_fetched(&self, booking: &Booking) -> Result<AwardReceipt, LedgerError> {
        if booking.status != BookingStatus::Cancelled {
            return Err(LedgerError::InvalidState(format!(
                "booking {} is {}, only cancelled bookings can be reversed",
                booking.id, booking.status
            )));
        }

        let events = self.award_log(&booking.user_id).await?;
        let index = AwardIndex::from_events(&events);

        let mut receipt = AwardReceipt::for_booking(booking.id.clone());
        for (key, credited) in index.active_for_booking(&booking.id) {
            let reversal =
                AwardEvent::reversal_of(key, credited, self.env.ids.next_id(), self.env.clock.now());
            self.append_event(reversal, &mut receipt).await?;
        }

        tracing::info!(
            user_id = %booking.user_id,
            reversed = receipt.accepted.len(),
            "Booking awards reversed"
        );
        Ok(receipt)
    }

    /// React to a booking status change reported by the booking service.
    ///
    /// `completed` awards, `cancelled` reverses, anything else is ignored.
    ///
    /// # Errors
    ///
    /// Errors of [`LoyaltyLedger::award_booking`] or
    /// [`LoyaltyLedger::reverse_fetched`].
    #[tracing::instrument(skip_all, fields(booking_id = %booking_id))]
    pub async fn handle_status_change(
        &self,
        booking_id: &BookingId,
    ) -> Result<StatusChangeOutcome, LedgerError> {
        let booking = self.fetch_booking(booking_id).await?;
        match booking.status {
            BookingStatus::Completed => Ok(StatusChangeOutcome::Awarded(
                self.award_booking(&booking).await?,
            )),
            BookingStatus::Cancelled => Ok(StatusChangeOutcome::Reversed(
                self.reverse_fetched(&booking).await?,
            )),
            status => {
                tracing::debug!(status = %status, "Status change needs no ledger action");
                Ok(StatusChangeOutcome::Ignored { status })
            }
        }
    }

    /// Backfill awards missing for `user_id`'s completed bookings.
    ///
    /// Scans for the same user run one at a time; a clean ledger yields an
    /// empty report.
    ///
    /// # Errors
    ///
    /// Returns [`ReconciliationError`] with the corrections that landed when
    /// the scan fails midway, or an empty report when no rule is configured.
    #[tracing::instrument(skip_all, fields(user_id = %user_id))]
    pub async fn reconcile(&self, user_id: &UserId) -> Result<ReconciliationReport, ReconciliationError> {
        let rule = self
            .earning_rule()
            .map_err(|e| ReconciliationError::before_scan(user_id.clone(), e))?;

        let _guard = self.reconcile_locks.lock(user_id).await;
        let started = Instant::now();

        let scanner = ReconciliationScanner {
            store: self.store.as_ref(),
            bookings: self.bookings.as_ref(),
            rule: &rule,
            env: &self.env,
            retry: &self.retry,
        };
        let report = scanner.scan(user_id).await?;

        LedgerMetrics::record_reconciliation(report.corrections.len(), started.elapsed());
        tracing::info!(
            bookings_scanned = report.bookings_scanned,
            awards_missing = report.awards_missing,
            awards_fixed = report.awards_fixed,
            amount_mismatches = report.amount_mismatches,
            "Reconciliation finished"
        );
        Ok(report)
    }

    /// How many of `requested_points` the user may spend on a booking
    /// totalling `booking_total`.
    ///
    /// # Errors
    ///
    /// - `ConfigMissing`: no earning rule
    /// - `TransientStoreFailure`: store unreachable after retries
    pub async fn redeem_check(
        &self,
        user_id: &UserId,
        requested_points: i64,
        booking_total: Money,
    ) -> Result<RedemptionDecision, LedgerError> {
        let rule = self.earning_rule()?;
        let total_points = self.total_points(user_id).await?;
        let decision =
            redemption::can_redeem(&rule, total_points, requested_points, booking_total);

        tracing::debug!(
            user_id = %user_id,
            total_points,
            requested_points,
            allowed_points = decision.allowed_points,
            "Redemption checked"
        );
        Ok(decision)
    }

    async fn fetch_booking(&self, booking_id: &BookingId) -> Result<Booking, LedgerError> {
        retry_transient(&self.retry, || self.bookings.get_booking(booking_id.clone()))
            .await?
            .ok_or_else(|| LedgerError::booking_not_found(booking_id))
    }

    async fn append_award(
        &self,
        award: PendingAward,
        reason: AwardReason,
        receipt: &mut AwardReceipt,
    ) -> Result<(), LedgerError> {
        let event = award.into_event(self.env.ids.next_id(), self.env.clock.now(), reason);
        self.append_event(event, receipt).await
    }

    async fn append_event(
        &self,
        event: AwardEvent,
        receipt: &mut AwardReceipt,
    ) -> Result<(), LedgerError> {
        match retry_transient(&self.retry, || self.store.append(event.clone())).await? {
            AppendOutcome::Accepted => {
                LedgerMetrics::record_append(event.currency, event.reason);
                receipt.accepted.push(event);
            }
            AppendOutcome::RejectedDuplicate => {
                LedgerMetrics::record_duplicate();
                tracing::debug!(key = %event.key(), reason = %event.reason, "Duplicate award rejected");
                receipt.rejected_duplicate.push(event.key());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use salon_loyalty_core::{Currency, SalonId};

    fn key(currency: Currency) -> AwardKey {
        AwardKey {
            user_id: UserId::new("u-1"),
            booking_id: Some(BookingId::new("b-1")),
            currency,
            salon_id: (currency == Currency::SalonPoint).then(|| SalonId::new("s-1")),
        }
    }

    #[test]
    fn receipt_duplicate_only_when_nothing_written() {
        let mut receipt = AwardReceipt::for_booking(BookingId::new("b-1"));
        assert!(!receipt.is_duplicate());

        receipt.rejected_duplicate.push(key(Currency::Coin));
        assert!(receipt.is_duplicate());

        receipt.accepted.push(
            PendingAward {
                key: key(Currency::SalonPoint),
                amount: 4,
            }
            .into_event(
                salon_loyalty_core::AwardEventId::new(),
                salon_loyalty_core::Utc::now(),
                AwardReason::Earned,
            ),
        );
        assert!(!receipt.is_duplicate());
        assert_eq!(receipt.total_amount(), 4);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn status_change_outcome_is_tagged() {
        let json = serde_json::to_value(StatusChangeOutcome::Ignored {
            status: BookingStatus::Pending,
        })
        .unwrap();
        assert_eq!(json["action"], "ignored");
        assert_eq!(json["status"], "pending");
    }
}
