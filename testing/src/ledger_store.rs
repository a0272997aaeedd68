//! In-memory ledger stores.
//!
//! - [`InMemoryLedgerStore`]: the award log in a `Vec`, with an incrementally
//!   maintained balance cache that must always equal the log fold
//! - [`FlakyLedgerStore`]: wraps another store and injects transient failures

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use salon_loyalty_core::ledger::LedgerFuture;
use salon_loyalty_core::{
    AppendOutcome, AwardEvent, AwardIndex, Balance, BookingId, LedgerError, LedgerStore, UserId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct Inner {
    events: Vec<AwardEvent>,
    index: AwardIndex,
    balances: HashMap<UserId, Balance>,
}

impl Inner {
    fn rebuild(&mut self) {
        self.index = AwardIndex::from_events(&self.events);
        self.balances.clear();
        for event in &self.events {
            self.balances
                .entry(event.user_id.clone())
                .or_default()
                .apply(event)
                .unwrap();
        }
    }
}

/// In-memory award log for fast, deterministic tests.
///
/// The admission check and the insert happen under one write lock, so
/// concurrent awards for the same key see exactly one `Accepted`.
///
/// # Example
///
/// ```
/// use salon_loyalty_testing::InMemoryLedgerStore;
/// use salon_loyalty_core::{LedgerStore, UserId};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryLedgerStore::new();
/// let balance = store.read_balance(UserId::new("u-1")).await?;
/// assert_eq!(balance.coins, 0);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryLedgerStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryLedgerStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event in append order, across users.
    #[must_use]
    pub fn events(&self) -> Vec<AwardEvent> {
        self.inner.read().unwrap().events.clone()
    }

    /// Number of events held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().events.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().events.is_empty()
    }

    /// Drop every event of `booking_id`, simulating an award that was never
    /// written. Returns how many events were removed.
    pub fn forget_booking(&self, booking_id: &BookingId) -> usize {
        let mut inner = self.inner.write().unwrap();
        let before = inner.events.len();
        inner
            .events
            .retain(|event| event.booking_id.as_ref() != Some(booking_id));
        inner.rebuild();
        before - inner.events.len()
    }

    /// Whether the cached balance of `user_id` equals the fold of its log.
    #[must_use]
    pub fn cache_matches_log(&self, user_id: &UserId) -> bool {
        let inner = self.inner.read().unwrap();
        let folded = Balance::fold(inner.events.iter().filter(|e| &e.user_id == user_id));
        let cached = inner.balances.get(user_id).cloned().unwrap_or_default();
        folded == Ok(cached)
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn append(&self, event: AwardEvent) -> LedgerFuture<'_, AppendOutcome> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            event.validate()?;

            let mut inner = inner.write().unwrap();
            if !inner.index.admits(&event) {
                return Ok(AppendOutcome::RejectedDuplicate);
            }
            let mut balance = inner.balances.get(&event.user_id).cloned().unwrap_or_default();
            balance.apply(&event)?;
            inner.index.record(&event);
            inner.balances.insert(event.user_id.clone(), balance);
            inner.events.push(event);
            Ok(AppendOutcome::Accepted)
        })
    }

    fn load_events(&self, user_id: UserId) -> LedgerFuture<'_, Vec<AwardEvent>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            Ok(inner
                .read()
                .unwrap()
                .events
                .iter()
                .filter(|event| event.user_id == user_id)
                .cloned()
                .collect())
        })
    }

    fn read_balance(&self, user_id: UserId) -> LedgerFuture<'_, Balance> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            Ok(inner
                .read()
                .unwrap()
                .balances
                .get(&user_id)
                .cloned()
                .unwrap_or_default())
        })
    }
}

/// A store that fails with `TransientStoreFailure` on demand.
///
/// Two knobs:
/// - [`FlakyLedgerStore::fail_next`]: the next `n` calls of any kind fail
/// - [`FlakyLedgerStore::allow_appends`]: after `n` more successful appends,
///   every append fails until [`FlakyLedgerStore::recover`]
#[derive(Clone, Debug)]
pub struct FlakyLedgerStore {
    inner: InMemoryLedgerStore,
    failures_left: Arc<AtomicUsize>,
    appends_left: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl FlakyLedgerStore {
    /// Wrap `inner`; no failures until configured.
    #[must_use]
    pub fn new(inner: InMemoryLedgerStore) -> Self {
        Self {
            inner,
            failures_left: Arc::new(AtomicUsize::new(0)),
            appends_left: Arc::new(AtomicUsize::new(usize::MAX)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail the next `n` calls.
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Let `n` more appends through, then fail every append.
    pub fn allow_appends(&self, n: usize) {
        self.appends_left.store(n, Ordering::SeqCst);
    }

    /// Stop failing appends.
    pub fn recover(&self) {
        self.appends_left.store(usize::MAX, Ordering::SeqCst);
        self.failures_left.store(0, Ordering::SeqCst);
    }

    /// Calls received, failed ones included.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The wrapped store.
    #[must_use]
    pub const fn inner(&self) -> &InMemoryLedgerStore {
        &self.inner
    }

    fn injected_failure(&self) -> Option<LedgerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok()
            .map(|_| LedgerError::TransientStoreFailure("injected failure".to_string()))
    }

    fn append_blocked(&self) -> bool {
        self.appends_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                usize::MAX => Some(n),
                0 => None,
                n => Some(n - 1),
            })
            .is_err()
    }
}

impl LedgerStore for FlakyLedgerStore {
    fn append(&self, event: AwardEvent) -> LedgerFuture<'_, AppendOutcome> {
        if let Some(err) = self.injected_failure() {
            return Box::pin(async move { Err(err) });
        }
        if self.append_blocked() {
            return Box::pin(async {
                Err(LedgerError::TransientStoreFailure(
                    "store unavailable".to_string(),
                ))
            });
        }
        self.inner.append(event)
    }

    fn load_events(&self, user_id: UserId) -> LedgerFuture<'_, Vec<AwardEvent>> {
        if let Some(err) = self.injected_failure() {
            return Box::pin(async move { Err(err) });
        }
        self.inner.load_events(user_id)
    }

    fn read_balance(&self, user_id: UserId) -> LedgerFuture<'_, Balance> {
        if let Some(err) = self.injected_failure() {
            return Box::pin(async move { Err(err) });
        }
        self.inner.read_balance(user_id)
    }
}
