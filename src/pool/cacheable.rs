//! The capability every pooled object exposes to [`CachePool`](super::CachePool).

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// An object whose memory the [`CachePool`](super::CachePool) accounts for.
///
/// The pool owns the authoritative pin count for each entry and mirrors it
/// through [`set_pin_count`](Cacheable::set_pin_count), so implementations
/// only need somewhere to store it (see [`Tracked`]).
pub trait Cacheable {
    /// Resource units this object consumes.
    ///
    /// Read when the object is registered. A changed cost is only picked up
    /// by registering the object again.
    fn cost(&self) -> u64;

    /// Eviction priority. Lower scores are evicted first.
    fn score(&self) -> f64;

    /// Pin count as last set by the pool.
    fn pin_count(&self) -> usize;

    /// Called by the pool whenever the entry's pin count changes.
    fn set_pin_count(&self, count: usize);

    /// Called on every pin with a monotonically increasing recency stamp.
    fn on_access(&self, recency: u64) {
        let _ = recency;
    }

    /// Called exactly once, when the pool drops this entry.
    fn on_evicted(&self) {}
}

/// A value wrapped with the bookkeeping [`Cacheable`] needs.
///
/// Scores by recency of last pin, so the least recently pinned entry goes
/// first. Evaluators wrap precomputed segments and similar derived
/// artifacts in this and register them in a pool.
#[derive(Debug)]
pub struct Tracked<T> {
    value: T,
    cost: AtomicU64,
    pin_count: AtomicUsize,
    last_access: AtomicU64,
    evicted: AtomicBool,
}

impl<T> Tracked<T> {
    /// Wrap `value` with an initial cost.
    pub fn new(value: T, cost: u64) -> Self {
        Self {
            value,
            cost: AtomicU64::new(cost),
            pin_count: AtomicUsize::new(0),
            last_access: AtomicU64::new(0),
            evicted: AtomicBool::new(false),
        }
    }

    /// The wrapped value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Update the cost. The pool only sees it after re-registration.
    pub fn set_cost(&self, cost: u64) {
        self.cost.store(cost, Ordering::Relaxed);
    }

    /// Recency stamp of the last pin, 0 if never pinned.
    pub fn last_access(&self) -> u64 {
        self.last_access.load(Ordering::Relaxed)
    }

    /// Whether a pool has evicted this object at least once.
    pub fn is_evicted(&self) -> bool {
        self.evicted.load(Ordering::Acquire)
    }
}

impl<T> Cacheable for Tracked<T> {
    fn cost(&self) -> u64 {
        self.cost.load(Ordering::Relaxed)
    }

    fn score(&self) -> f64 {
        self.last_access() as f64
    }

    fn pin_count(&self) -> usize {
        self.pin_count.load(Ordering::Relaxed)
    }

    fn set_pin_count(&self, count: usize) {
        self.pin_count.store(count, Ordering::Relaxed);
    }

    fn on_access(&self, recency: u64) {
        self.last_access.store(recency, Ordering::Relaxed);
    }

    fn on_evicted(&self) {
        self.evicted.store(true, Ordering::Release);
    }
}
