//! Award log entries and their idempotency key.
//!
//! An [`AwardEvent`] is an immutable fact in a user's ledger. The log is
//! append-only: corrections and reversals are new entries, never edits.

use crate::error::LedgerError;
use crate::ids::{AwardEventId, BookingId, SalonId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest magnitude a single award entry may carry.
///
/// Keeps every user's balance far inside `i64`, and inside `BIGINT` for SQL
/// stores that sum amounts.
pub const MAX_AWARD_AMOUNT: i64 = 1_000_000_000_000;

/// The loyalty currency an award is denominated in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Currency {
    /// Platform-wide coins, usable at any salon
    Coin,
    /// Points scoped to a single salon
    SalonPoint,
}

impl Currency {
    /// Database/wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Coin => "coin",
            Self::SalonPoint => "salon_point",
        }
    }

    /// Parse from the database/wire representation.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] for an unknown currency.
    pub fn parse(s: &str) -> Result<Self, LedgerError> {
        match s {
            "coin" => Ok(Self::Coin),
            "salon_point" => Ok(Self::SalonPoint),
            _ => Err(LedgerError::Storage(format!("Invalid currency: {s}"))),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an award entry exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwardReason {
    /// Awarded when the booking completed
    Earned,
    /// Backfilled by reconciliation for an award that should have existed
    Correction,
    /// One-off coins granted on enrollment
    SignupBonus,
    /// Negates an earlier credit (booking cancelled after completion)
    Reversal,
}

impl AwardReason {
    /// Database/wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Earned => "earned",
            Self::Correction => "correction",
            Self::SignupBonus => "signup_bonus",
            Self::Reversal => "reversal",
        }
    }

    /// Parse from the database/wire representation.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] for an unknown reason.
    pub fn parse(s: &str) -> Result<Self, LedgerError> {
        match s {
            "earned" => Ok(Self::Earned),
            "correction" => Ok(Self::Correction),
            "signup_bonus" => Ok(Self::SignupBonus),
            "reversal" => Ok(Self::Reversal),
            _ => Err(LedgerError::Storage(format!("Invalid award reason: {s}"))),
        }
    }

    /// Credits open a key; reversals close it.
    #[must_use]
    pub const fn is_credit(self) -> bool {
        !matches!(self, Self::Reversal)
    }
}

impl fmt::Display for AwardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Idempotency key of an award.
///
/// For booking awards this is `(booking, currency, salon)`; the signup bonus
/// uses the user with no booking and no salon. At most one non-reversed credit
/// may exist per key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AwardKey {
    /// Owner of the ledger
    pub user_id: UserId,
    /// Booking that caused the award (absent for the signup bonus)
    pub booking_id: Option<BookingId>,
    /// Currency of the award
    pub currency: Currency,
    /// Salon the points belong to (absent for coins)
    pub salon_id: Option<SalonId>,
}

impl AwardKey {
    /// Key of the signup bonus for `user_id`.
    #[must_use]
    pub const fn signup_bonus(user_id: UserId) -> Self {
        Self {
            user_id,
            booking_id: None,
            currency: Currency::Coin,
            salon_id: None,
        }
    }

    /// Stable textual form, used as the advisory lock name in SQL stores.
    #[must_use]
    pub fn lock_name(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.user_id,
            self.booking_id.as_ref().map_or("", BookingId::as_str),
            self.currency,
            self.salon_id.as_ref().map_or("", SalonId::as_str),
        )
    }
}

impl fmt::Display for AwardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lock_name())
    }
}

/// An immutable award log entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardEvent {
    /// Entry identifier
    pub id: AwardEventId,
    /// Owner of the ledger
    pub user_id: UserId,
    /// Booking that caused the entry (absent for the signup bonus)
    pub booking_id: Option<BookingId>,
    /// Currency of the amount
    pub currency: Currency,
    /// Salon the points belong to (absent for coins)
    pub salon_id: Option<SalonId>,
    /// Signed amount; negative only for reversals
    pub amount: i64,
    /// Why the entry exists
    pub reason: AwardReason,
    /// When the entry was appended
    pub created_at: DateTime<Utc>,
}

impl AwardEvent {
    /// The idempotency key this entry belongs to.
    #[must_use]
    pub fn key(&self) -> AwardKey {
        AwardKey {
            user_id: self.user_id.clone(),
            booking_id: self.booking_id.clone(),
            currency: self.currency,
            salon_id: self.salon_id.clone(),
        }
    }

    /// Reversal entry for `key`, negating the `credited` amount.
    #[must_use]
    pub fn reversal_of(
        key: AwardKey,
        credited: i64,
        id: AwardEventId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id: key.user_id,
            booking_id: key.booking_id,
            currency: key.currency,
            salon_id: key.salon_id,
            amount: -credited,
            reason: AwardReason::Reversal,
            created_at,
        }
    }

    /// Check the entry is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidState`] when the currency/salon pairing is
    /// wrong, a booking-less entry is not a signup bonus, the amount sign
    /// does not match the reason, or the amount exceeds [`MAX_AWARD_AMOUNT`].
    pub fn validate(&self) -> Result<(), LedgerError> {
        match (self.currency, &self.salon_id) {
            (Currency::Coin, Some(salon)) => {
                return Err(LedgerError::InvalidState(format!(
                    "coin award {} must not name a salon ({salon})",
                    self.id
                )));
            }
            (Currency::SalonPoint, None) => {
                return Err(LedgerError::InvalidState(format!(
                    "salon point award {} must name a salon",
                    self.id
                )));
            }
            _ => {}
        }

        let booking_less = self.booking_id.is_none();
        if booking_less != (self.reason == AwardReason::SignupBonus) {
            return Err(LedgerError::InvalidState(format!(
                "award {} ({}) has inconsistent booking reference",
                self.id, self.reason
            )));
        }

        let sign_ok = if self.reason.is_credit() {
            self.amount > 0
        } else {
            self.amount < 0
        };
        if !sign_ok {
            return Err(LedgerError::InvalidState(format!(
                "award {} ({}) has invalid amount {}",
                self.id, self.reason, self.amount
            )));
        }
        if self.amount.unsigned_abs() > MAX_AWARD_AMOUNT.unsigned_abs() {
            return Err(LedgerError::InvalidState(format!(
                "award {} amount {} exceeds the per-award ceiling of {MAX_AWARD_AMOUNT}",
                self.id, self.amount
            )));
        }

        Ok(())
    }
}

/// An award the rule engine says is due, before it gets an id and timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAward {
    /// Idempotency key of the award
    pub key: AwardKey,
    /// Amount to credit (always positive)
    pub amount: i64,
}

impl PendingAward {
    /// Materialise into a log entry with the given reason.
    #[must_use]
    pub fn into_event(
        self,
        id: AwardEventId,
        created_at: DateTime<Utc>,
        reason: AwardReason,
    ) -> AwardEvent {
        AwardEvent {
            id,
            user_id: self.key.user_id,
            booking_id: self.key.booking_id,
            currency: self.key.currency,
            salon_id: self.key.salon_id,
            amount: self.amount,
            reason,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coin_event(reason: AwardReason, amount: i64) -> AwardEvent {
        AwardEvent {
            id: AwardEventId::new(),
            user_id: UserId::new("u-1"),
            booking_id: Some(BookingId::new("b-1")),
            currency: Currency::Coin,
            salon_id: None,
            amount,
            reason,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn reversal_negates_amount_and_keeps_key() {
        let earned = coin_event(AwardReason::Earned, 12);
        let reversal = AwardEvent::reversal_of(earned.key(), 12, AwardEventId::new(), Utc::now());
        assert_eq!(reversal.amount, -12);
        assert_eq!(reversal.reason, AwardReason::Reversal);
        assert_eq!(reversal.key(), earned.key());
        assert!(reversal.validate().is_ok());
    }

    #[test]
    fn validate_rejects_coin_with_salon() {
        let mut event = coin_event(AwardReason::Earned, 5);
        event.salon_id = Some(SalonId::new("s-1"));
        assert!(event.validate().is_err());
    }

    #[test]
    fn validate_rejects_wrong_sign() {
        assert!(coin_event(AwardReason::Earned, 0).validate().is_err());
        assert!(coin_event(AwardReason::Correction, -3).validate().is_err());
        assert!(coin_event(AwardReason::Reversal, 3).validate().is_err());
    }

    #[test]
    fn validate_enforces_award_ceiling() {
        assert!(coin_event(AwardReason::Earned, MAX_AWARD_AMOUNT).validate().is_ok());
        assert!(coin_event(AwardReason::Earned, MAX_AWARD_AMOUNT + 1).validate().is_err());
        assert!(coin_event(AwardReason::Correction, i64::MAX).validate().is_err());
        assert!(coin_event(AwardReason::Reversal, i64::MIN).validate().is_err());
    }

    #[test]
    fn validate_requires_booking_except_signup() {
        let mut event = coin_event(AwardReason::Earned, 5);
        event.booking_id = None;
        assert!(event.validate().is_err());

        event.reason = AwardReason::SignupBonus;
        assert!(event.validate().is_ok());
    }

    #[test]
    fn signup_key_lock_name() {
        let key = AwardKey::signup_bonus(UserId::new("u-9"));
        assert_eq!(key.lock_name(), "u-9||coin|");
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn reason_and_currency_parse() {
        for reason in [
            AwardReason::Earned,
            AwardReason::Correction,
            AwardReason::SignupBonus,
            AwardReason::Reversal,
        ] {
            assert_eq!(AwardReason::parse(reason.as_str()).unwrap(), reason);
        }
        assert_eq!(Currency::parse("salon_point").unwrap(), Currency::SalonPoint);
        assert!(Currency::parse("gold").is_err());
    }
}
