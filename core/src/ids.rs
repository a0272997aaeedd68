//! Strongly typed identifiers for ledger participants.
//!
//! Users, salons and bookings are owned by the surrounding booking platform,
//! which hands them to the ledger as opaque strings. The ledger wraps each in
//! its own newtype so a salon id can never be passed where a booking id is
//! expected.
//!
//! # Validation
//!
//! - `FromStr::from_str()`: Validates input (rejects empty strings)
//! - `From::from()` and `new()`: No validation (for trusted, application-built ids)
//!
//! # Examples
//!
//! ```
//! use salon_loyalty_core::ids::{BookingId, UserId};
//!
//! let user = UserId::new("user-42");
//! assert_eq!(user.as_str(), "user-42");
//!
//! let booking: BookingId = "booking-7".parse().unwrap();
//! assert_eq!(booking, BookingId::new("booking-7"));
//!
//! assert!("".parse::<UserId>().is_err());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Error type for identifier parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {kind}: {reason}")]
pub struct ParseIdError {
    kind: &'static str,
    reason: String,
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Create a new `", stringify!($name), "` without validation.")]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Convert the identifier into its inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.trim().is_empty() {
                    return Err(ParseIdError {
                        kind: $kind,
                        reason: "identifier cannot be empty".to_string(),
                    });
                }
                Ok(Self(s.to_string()))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a platform user (the customer who books and earns).
    UserId,
    "user id"
);

string_id!(
    /// Identifier of a salon. Salon points are scoped to one salon.
    SalonId,
    "salon id"
);

string_id!(
    /// Identifier of a booking owned by the external booking service.
    BookingId,
    "booking id"
);

/// Unique identifier of a single award log entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AwardEventId(Uuid);

impl AwardEventId {
    /// Creates a new random `AwardEventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an `AwardEventId` from a UUID
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AwardEventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AwardEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_and_as_str() {
        let id = SalonId::new("salon-1");
        assert_eq!(id.as_str(), "salon-1");
        assert_eq!(id.into_inner(), "salon-1");
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: Test will fail if parse fails
    fn parse_from_str() {
        let id: BookingId = "booking-9".parse().expect("parse should succeed");
        assert_eq!(id, BookingId::from("booking-9"));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn parse_blank_fails_with_kind() {
        let err = "  ".parse::<UserId>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid user id: identifier cannot be empty");
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&UserId::new("u-1")).expect("serialize");
        assert_eq!(json, "\"u-1\"");
    }

    #[test]
    fn award_event_ids_are_unique() {
        assert_ne!(AwardEventId::new(), AwardEventId::new());
    }
}
