//! Time-windowed set of pending transactions
//!
//! Entries are kept in arrival order. An entry is visible while
//! `now - first_seen_at < max_age`; eviction removes exactly the entries that
//! are no longer visible. Both operations take `now` explicitly so the
//! monitor passes the wall clock and tests can drive time.

use ethers::types::H256;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use crate::types::PendingTransaction;

pub struct WorkingSet {
    max_age: Duration,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    order: VecDeque<PendingTransaction>,
    hashes: HashSet<H256>,
}

impl WorkingSet {
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Evict expired entries, then insert `tx` unless its hash is present.
    /// Returns whether the transaction was added.
    pub fn insert(&self, tx: PendingTransaction, now: Instant) -> bool {
        let mut inner = self.inner.lock();
        Self::evict_locked(&mut inner, self.max_age, now);

        if !inner.hashes.insert(tx.hash) {
            return false;
        }
        inner.order.push_back(tx);
        true
    }

    /// Visible entries in insertion order
    pub fn snapshot(&self, now: Instant) -> Vec<PendingTransaction> {
        let inner = self.inner.lock();
        inner
            .order
            .iter()
            .filter(|tx| is_fresh(tx, self.max_age, now))
            .cloned()
            .collect()
    }

    pub fn contains(&self, hash: &H256) -> bool {
        self.inner.lock().hashes.contains(hash)
    }

    /// Entries retained in memory, expired or not
    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of entries removed
    pub fn evict(&self, now: Instant) -> usize {
        let mut inner = self.inner.lock();
        Self::evict_locked(&mut inner, self.max_age, now)
    }

    fn evict_locked(inner: &mut Inner, max_age: Duration, now: Instant) -> usize {
        let before = inner.order.len();
        let Inner { order, hashes } = inner;
        order.retain(|tx| {
            let keep = is_fresh(tx, max_age, now);
            if !keep {
                hashes.remove(&tx.hash);
            }
            keep
        });
        before - order.len()
    }
}

#[inline]
fn is_fresh(tx: &PendingTransaction, max_age: Duration, now: Instant) -> bool {
    now.saturating_duration_since(tx.first_seen_at) < max_age
}
