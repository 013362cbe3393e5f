//! Cost-accounted pinning pool for expensive derived artifacts.
//!
//! [`CachePool`] tracks every registered [`Cacheable`] together with its
//! last-read cost and a pin count. Pinned entries are never evicted. When
//! the last pin on an entry is released while the pool is over its
//! `max_cost` budget, the pool lazily evicts unpinned entries, lowest score
//! first, until it is back under budget. [`CachePool::flush`] evicts every
//! unpinned entry regardless of budget.
//!
//! # Identity
//!
//! Objects are handed to the pool as `Arc<C>` and identified by their
//! allocation, never by value. The pool keeps a strong reference for as
//! long as the entry is registered, so pinned objects stay alive without a
//! caller-side collection; [`CachePool::pinned`] returns a snapshot of them.
//!
//! # Tie-break
//!
//! Among unpinned entries with equal scores, the oldest registration is
//! evicted first.
//!
//! # Concurrency
//!
//! Not synchronized. Mutations take `&mut self`; share a pool across
//! threads only behind an external lock, or give each worker its own.

mod cacheable;

pub use cacheable::{Cacheable, Tracked};

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::telemetry;

/// Why an entry left the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EvictionReason {
    Lazy,
    Flush,
}

impl EvictionReason {
    fn as_str(self) -> &'static str {
        match self {
            EvictionReason::Lazy => "lazy",
            EvictionReason::Flush => "flush",
        }
    }
}

struct Entry<C: ?Sized> {
    object: Arc<C>,
    cost: u64,
    pin_count: usize,
}

/// Pool of cost-accounted, pinnable objects with lazy eviction.
pub struct CachePool<C: Cacheable + ?Sized> {
    /// Entries keyed by registration sequence, so iteration is oldest first.
    entries: BTreeMap<u64, Entry<C>>,
    /// Allocation address → registration sequence.
    index: HashMap<usize, u64>,
    next_seq: u64,
    clock: u64,
    max_cost: u64,
    total_cost: u64,
    pinned_cost: u64,
}

fn identity<C: ?Sized>(object: &Arc<C>) -> usize {
    Arc::as_ptr(object) as *const () as usize
}

impl<C: Cacheable + ?Sized> CachePool<C> {
    /// Create an empty pool that starts evicting above `max_cost`.
    pub fn new(max_cost: u64) -> Self {
        Self {
            entries: BTreeMap::new(),
            index: HashMap::new(),
            next_seq: 0,
            clock: 0,
            max_cost,
            total_cost: 0,
            pinned_cost: 0,
        }
    }

    /// Register `object` with `initial_pin_count` pins.
    ///
    /// An object that is already registered is not duplicated: its cost is
    /// re-read and `initial_pin_count` pins are added, as if it had been
    /// pinned that many times. Returns the resulting pin count.
    pub fn register(&mut self, object: &Arc<C>, initial_pin_count: usize) -> usize {
        if initial_pin_count > 0 {
            self.touch(object);
        }
        let existing = self.index.get(&identity(object)).copied();
        let Some(seq) = existing else {
            return self.insert(object, initial_pin_count);
        };

        let new_cost = object.cost();
        let Some(entry) = self.entries.get_mut(&seq) else {
            return 0;
        };
        let old_cost = std::mem::replace(&mut entry.cost, new_cost);
        self.total_cost = self.total_cost - old_cost + new_cost;
        if entry.pin_count > 0 {
            self.pinned_cost = self.pinned_cost - old_cost + new_cost;
        }
        trace!(seq, old_cost, new_cost, "re-registered pool entry");

        let count = if initial_pin_count > 0 {
            self.add_pins(seq, initial_pin_count)
        } else {
            entry.pin_count
        };
        self.record_costs();
        count
    }

    /// Pin `object`, registering it with one pin if it is not in the pool.
    ///
    /// Returns the new pin count.
    pub fn pin(&mut self, object: &Arc<C>) -> usize {
        self.touch(object);

        let existing = self.index.get(&identity(object)).copied();
        let count = match existing {
            Some(seq) => self.add_pins(seq, 1),
            None => self.insert(object, 1),
        };
        self.record_costs();
        count
    }

    /// Release one pin on `object`.
    ///
    /// Returns `None` if the object is not registered. Unpinning an entry
    /// whose pin count is already zero does nothing. When the count drops to
    /// zero while the pool is over budget, lazy eviction runs and may evict
    /// this very object.
    pub fn unpin(&mut self, object: &Arc<C>) -> Option<usize> {
        let seq = *self.index.get(&identity(object))?;
        let entry = self.entries.get_mut(&seq)?;
        if entry.pin_count == 0 {
            return Some(0);
        }

        entry.pin_count -= 1;
        entry.object.set_pin_count(entry.pin_count);
        let count = entry.pin_count;
        trace!(seq, pin_count = count, "unpinned pool entry");

        if count == 0 {
            self.pinned_cost -= entry.cost;
            if self.total_cost > self.max_cost {
                self.evict_over_budget();
            }
        }
        self.record_costs();
        Some(count)
    }

    /// Evict every unpinned entry, regardless of budget.
    ///
    /// Returns the number of entries evicted.
    pub fn flush(&mut self) -> usize {
        let unpinned: Vec<u64> = self
            .entries
            .iter()
            .filter(|(_, e)| e.pin_count == 0)
            .map(|(&seq, _)| seq)
            .collect();
        for &seq in &unpinned {
            self.evict(seq, EvictionReason::Flush);
        }
        if !unpinned.is_empty() {
            debug!(evicted = unpinned.len(), total_cost = self.total_cost, "flushed cache pool");
        }
        self.record_costs();
        unpinned.len()
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of the recorded costs of all entries.
    pub fn total_cost(&self) -> u64 {
        self.total_cost
    }

    /// Sum of the recorded costs of entries with a positive pin count.
    pub fn pinned_cost(&self) -> u64 {
        self.pinned_cost
    }

    /// The eviction threshold.
    pub fn max_cost(&self) -> u64 {
        self.max_cost
    }

    /// Change the eviction threshold.
    ///
    /// Never evicts by itself; the new budget applies at the next unpin that
    /// releases an entry's last pin.
    pub fn set_max_cost(&mut self, max_cost: u64) {
        self.max_cost = max_cost;
    }

    /// Snapshot of the currently pinned objects, oldest registration first.
    pub fn pinned(&self) -> Vec<Arc<C>> {
        self.entries
            .values()
            .filter(|e| e.pin_count > 0)
            .map(|e| Arc::clone(&e.object))
            .collect()
    }

    /// Whether `object` is registered.
    pub fn contains(&self, object: &Arc<C>) -> bool {
        self.index.contains_key(&identity(object))
    }

    /// Pin count of `object`, or `None` if it is not registered.
    pub fn pin_count_of(&self, object: &Arc<C>) -> Option<usize> {
        let seq = self.index.get(&identity(object))?;
        self.entries.get(seq).map(|e| e.pin_count)
    }

    /// All registered objects, oldest registration first.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<C>> {
        self.entries.values().map(|e| &e.object)
    }

    fn insert(&mut self, object: &Arc<C>, pin_count: usize) -> usize {
        let seq = self.next_seq;
        self.next_seq += 1;

        let cost = object.cost();
        self.total_cost += cost;
        if pin_count > 0 {
            self.pinned_cost += cost;
        }
        object.set_pin_count(pin_count);
        self.index.insert(identity(object), seq);
        self.entries.insert(
            seq,
            Entry {
                object: Arc::clone(object),
                cost,
                pin_count,
            },
        );
        trace!(seq, cost, pin_count, "registered pool entry");
        self.record_costs();
        pin_count
    }

    fn add_pins(&mut self, seq: u64, pins: usize) -> usize {
        let Some(entry) = self.entries.get_mut(&seq) else {
            return 0;
        };
        if entry.pin_count == 0 {
            self.pinned_cost += entry.cost;
        }
        entry.pin_count = entry.pin_count.saturating_add(pins);
        entry.object.set_pin_count(entry.pin_count);
        trace!(seq, pin_count = entry.pin_count, "pinned pool entry");
        entry.pin_count
    }

    /// Stamp `object` with the next recency tick.
    fn touch(&mut self, object: &Arc<C>) {
        self.clock += 1;
        object.on_access(self.clock);
    }

    /// Evict lowest-score unpinned entries until back under budget.
    fn evict_over_budget(&mut self) {
        while self.total_cost > self.max_cost {
            let victim = self
                .entries
                .iter()
                .filter(|(_, e)| e.pin_count == 0)
                .map(|(&seq, e)| (e.object.score(), seq))
                .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

            match victim {
                Some((_, seq)) => self.evict(seq, EvictionReason::Lazy),
                None => {
                    debug!(
                        total_cost = self.total_cost,
                        max_cost = self.max_cost,
                        "cache pool over budget with every entry pinned"
                    );
                    break;
                }
            }
        }
    }

    fn evict(&mut self, seq: u64, reason: EvictionReason) {
        let Some(entry) = self.entries.remove(&seq) else {
            return;
        };
        self.index.remove(&identity(&entry.object));
        self.total_cost -= entry.cost;

        debug!(
            seq,
            cost = entry.cost,
            score = entry.object.score(),
            reason = reason.as_str(),
            "evicted pool entry"
        );
        metrics::counter!(telemetry::POOL_EVICTIONS_TOTAL, "reason" => reason.as_str())
            .increment(1);
        entry.object.on_evicted();
    }

    fn record_costs(&self) {
        metrics::gauge!(telemetry::POOL_TOTAL_COST).set(self.total_cost as f64);
        metrics::gauge!(telemetry::POOL_PINNED_COST).set(self.pinned_cost as f64);
    }
}

impl<C: Cacheable + ?Sized> std::fmt::Debug for CachePool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachePool")
            .field("len", &self.entries.len())
            .field("max_cost", &self.max_cost)
            .field("total_cost", &self.total_cost)
            .field("pinned_cost", &self.pinned_cost)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(cost: u64) -> Arc<Tracked<&'static str>> {
        Arc::new(Tracked::new("segment", cost))
    }

    #[test]
    fn register_unpinned_counts_cost_only() {
        let mut pool = CachePool::new(10);
        let a = segment(4);
        assert_eq!(pool.register(&a, 0), 0);
        assert_eq!(pool.total_cost(), 4);
        assert_eq!(pool.pinned_cost(), 0);
        assert!(pool.pinned().is_empty());
    }

    #[test]
    fn reregister_rereads_cost() {
        let mut pool = CachePool::new(100);
        let a = segment(4);
        pool.register(&a, 1);
        a.set_cost(9);
        assert_eq!(pool.total_cost(), 4);

        assert_eq!(pool.register(&a, 0), 1);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.total_cost(), 9);
        assert_eq!(pool.pinned_cost(), 9);
    }

    #[test]
    fn reregister_adds_pins() {
        let mut pool = CachePool::new(100);
        let a = segment(2);
        pool.register(&a, 1);
        assert_eq!(pool.register(&a, 2), 3);
        assert_eq!(a.pin_count(), 3);
    }

    #[test]
    fn pin_mirrors_count_on_object() {
        let mut pool = CachePool::new(10);
        let a = segment(1);
        pool.pin(&a);
        pool.pin(&a);
        assert_eq!(a.pin_count(), 2);
        pool.unpin(&a);
        assert_eq!(a.pin_count(), 1);
    }

    #[test]
    fn unpin_unregistered_is_noop() {
        let mut pool: CachePool<Tracked<&str>> = CachePool::new(10);
        let a = segment(1);
        assert_eq!(pool.unpin(&a), None);
        assert!(pool.is_empty());
    }

    #[test]
    fn equal_scores_evict_oldest_first() {
        let mut pool = CachePool::new(1);
        let a = segment(1);
        let b = segment(1);
        let c = segment(1);
        // Registered without `pin`, so all three score 0.
        pool.register(&a, 0);
        pool.register(&b, 0);
        pool.register(&c, 1);
        pool.unpin(&c);

        assert!(a.is_evicted());
        assert!(b.is_evicted());
        assert!(!c.is_evicted());
        assert_eq!(pool.total_cost(), 1);
    }

    #[test]
    fn lazy_eviction_stops_at_budget() {
        let mut pool = CachePool::new(5);
        let old = segment(3);
        let young = segment(3);
        pool.pin(&old);
        pool.pin(&young);
        pool.unpin(&old);
        // 6 > 5: old (lowest recency) goes, young is still pinned.
        assert!(old.is_evicted());
        assert_eq!(pool.total_cost(), 3);

        pool.unpin(&young);
        // 3 <= 5: nothing to do.
        assert!(!young.is_evicted());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn set_max_cost_does_not_evict() {
        let mut pool = CachePool::new(100);
        let a = segment(10);
        pool.register(&a, 0);
        pool.set_max_cost(1);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.max_cost(), 1);
    }

    #[test]
    fn evicted_object_can_come_back() {
        let mut pool = CachePool::new(100);
        let a = segment(5);
        pool.register(&a, 0);
        pool.flush();
        assert!(!pool.contains(&a));

        pool.pin(&a);
        assert!(pool.contains(&a));
        assert_eq!(pool.pin_count_of(&a), Some(1));
        assert_eq!(pool.total_cost(), 5);
    }

    #[test]
    fn heterogeneous_entries_via_trait_objects() {
        let mut pool: CachePool<dyn Cacheable> = CachePool::new(10);
        let a: Arc<dyn Cacheable> = Arc::new(Tracked::new(1u32, 3));
        let b: Arc<dyn Cacheable> = Arc::new(Tracked::new("x", 4));
        pool.pin(&a);
        pool.register(&b, 0);
        assert_eq!(pool.total_cost(), 7);
        assert_eq!(pool.flush(), 1);
        assert_eq!(pool.pinned().len(), 1);
    }
}
