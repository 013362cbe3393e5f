//! Thread-safe memoization facade over a replaceable backing strategy.
//!
//! [`SmartCache`] serializes every operation through one mutex it owns, so
//! no reader ever observes a half-applied mutation and strategies never need
//! locking of their own. Nothing inside the lock blocks on I/O.
//!
//! Two strategies ship with the crate:
//!
//! - [`StrongStrategy`] — entries live until removed or cleared.
//! - [`SoftStrategy`] — entries may be reclaimed at any time. A miss only
//!   ever means "recompute", never "this key was never stored".
//!
//! # Keys
//!
//! Evaluators usually key memoized fragments by a [`fingerprint`] of the
//! computation's identity and parameters.

mod soft;
mod strong;

pub use soft::{SoftConfig, SoftStrategy};
pub use strong::StrongStrategy;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::telemetry;

/// Backing store behind a [`SmartCache`].
///
/// Called only while the facade's lock is held, so implementations need no
/// synchronization of their own. Never asked to store an absent value.
pub trait CacheStrategy<K, V>: Send {
    /// Short label used in logs and metrics.
    fn name(&self) -> &'static str;

    fn get(&self, key: &K) -> Option<V>;

    /// Store `value`, returning the previous value if one was resident.
    fn put(&mut self, key: K, value: V) -> Option<V>;

    fn remove(&mut self, key: &K) -> Option<V>;

    fn clear(&mut self);

    fn len(&self) -> usize;

    /// Owned copy of every resident entry.
    fn snapshot(&self) -> Vec<(K, V)>;
}

/// Which backing strategy a [`SmartCache`] should use.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StrategyKind {
    /// Ordinary references, kept until removed.
    #[default]
    Strong,
    /// Bounded, reclaimable entries.
    Soft(SoftConfig),
}

/// Synchronized key/value memoization cache.
pub struct SmartCache<K, V> {
    strategy: Mutex<Box<dyn CacheStrategy<K, V>>>,
    name: &'static str,
}

impl<K, V> SmartCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Cache backed by [`StrongStrategy`].
    pub fn strong() -> Self {
        Self::with_strategy(StrongStrategy::new())
    }

    /// Cache backed by [`SoftStrategy`].
    pub fn soft(config: &SoftConfig) -> Self {
        Self::with_strategy(SoftStrategy::new(config))
    }

    /// Cache backed by whichever strategy `kind` names.
    pub fn from_kind(kind: &StrategyKind) -> Self {
        match kind {
            StrategyKind::Strong => Self::strong(),
            StrategyKind::Soft(config) => Self::soft(config),
        }
    }
}

impl<K, V> SmartCache<K, V>
where
    K: Send + 'static,
    V: Clone + Send + 'static,
{
    /// Cache backed by a caller-supplied strategy.
    pub fn with_strategy(strategy: impl CacheStrategy<K, V> + 'static) -> Self {
        let name = strategy.name();
        Self {
            strategy: Mutex::new(Box::new(strategy)),
            name,
        }
    }

    /// Look up `key`.
    ///
    /// Returns `None` on a miss, which under the soft strategy may just mean
    /// the entry was reclaimed. Emits hit/miss metrics.
    pub fn get(&self, key: &K) -> Option<V> {
        let value = self.lock().get(key);
        match value {
            Some(_) => {
                metrics::counter!(telemetry::SMART_CACHE_HITS_TOTAL, "strategy" => self.name)
                    .increment(1);
            }
            None => {
                metrics::counter!(telemetry::SMART_CACHE_MISSES_TOTAL, "strategy" => self.name)
                    .increment(1);
            }
        }
        value
    }

    /// Store `value` under `key`, returning the previous value.
    ///
    /// Passing `None` removes the key instead, exactly like [`remove`](Self::remove).
    pub fn put(&self, key: K, value: impl Into<Option<V>>) -> Option<V> {
        match value.into() {
            Some(value) => self.lock().put(key, value),
            None => self.remove(&key),
        }
    }

    /// Remove `key`, returning the value it held.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.lock().remove(key)
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no entries are resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries resident at call time.
    ///
    /// The snapshot is taken under the lock and then released; later
    /// mutations are not reflected. Order is not guaranteed.
    pub fn entries(&self) -> std::vec::IntoIter<(K, V)> {
        self.lock().snapshot().into_iter()
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    ///
    /// `compute` runs outside the lock. If another thread stored a value for
    /// `key` in the meantime, that value wins and is returned.
    pub fn get_or_insert_with(&self, key: K, compute: impl FnOnce() -> V) -> V {
        if let Some(value) = self.get(&key) {
            return value;
        }
        let value = compute();

        let mut strategy = self.lock();
        if let Some(existing) = strategy.get(&key) {
            return existing;
        }
        strategy.put(key, value.clone());
        value
    }

    /// Label of the backing strategy ("strong", "soft", ...).
    pub fn strategy_name(&self) -> &'static str {
        self.name
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn CacheStrategy<K, V>>> {
        // Strategies stay consistent across a panicking caller, so a
        // poisoned lock is safe to reuse.
        self.strategy.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, V> std::fmt::Debug for SmartCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartCache")
            .field("strategy", &self.name)
            .finish()
    }
}

/// Derive a cache key from a computation's identity and parameters.
///
/// Uses `DefaultHasher` (SipHash). Deterministic within a process lifetime,
/// which is all an in-memory cache needs.
pub fn fingerprint<T: Hash + ?Sized>(computation: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    computation.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_deterministic() {
        let k1 = fingerprint(&("segment", "Sales", [2024u32, 1]));
        let k2 = fingerprint(&("segment", "Sales", [2024u32, 1]));
        assert_eq!(k1, k2);
    }

    #[test]
    fn fingerprint_differs_on_parameters() {
        let k1 = fingerprint(&("segment", "Sales", 2024u32));
        let k2 = fingerprint(&("segment", "Sales", 2025u32));
        assert_ne!(k1, k2);
    }

    #[test]
    fn fingerprint_parameter_order_matters() {
        let k1 = fingerprint(&["Time", "Store"]);
        let k2 = fingerprint(&["Store", "Time"]);
        assert_ne!(k1, k2);
    }

    #[test]
    fn strategy_kind_defaults_to_strong() {
        let cache: SmartCache<u64, String> = SmartCache::from_kind(&StrategyKind::default());
        assert_eq!(cache.strategy_name(), "strong");
    }

    #[test]
    fn soft_kind_builds_soft_cache() {
        let kind = StrategyKind::Soft(SoftConfig::new().max_entries(8));
        let cache: SmartCache<u64, String> = SmartCache::from_kind(&kind);
        assert_eq!(cache.strategy_name(), "soft");
    }

    #[test]
    fn put_none_on_missing_key_returns_none() {
        let cache: SmartCache<u64, String> = SmartCache::strong();
        assert_eq!(cache.put(1, None), None);
        assert!(cache.is_empty());
    }
}
