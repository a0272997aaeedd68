//! Injected dependencies: time and id generation.
//!
//! Both are traits so tests can pin them (see `salon-loyalty-testing`).

use crate::ids::AwardEventId;
use chrono::{DateTime, Utc};

/// Clock trait - abstracts time operations for testability
///
/// # Examples
///
/// ```
/// use salon_loyalty_core::environment::{Clock, SystemClock};
///
/// let now = SystemClock.now();
/// assert!(now.timestamp() > 0);
/// ```
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Source of award event identifiers.
pub trait IdGenerator: Send + Sync {
    /// Produce a fresh, unique id
    fn next_id(&self) -> AwardEventId;
}

/// Random (v4) UUID ids.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> AwardEventId {
        AwardEventId::new()
    }
}
