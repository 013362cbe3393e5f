//! Reclaimable backing store.
//!
//! There is no garbage collector to clear soft references under memory
//! pressure, so reclamation is an explicit bounded policy instead: a moka
//! cache capped at `max_entries` (TinyLFU admission, LRU eviction) with an
//! optional idle timeout. Either bound may drop an entry at any time, and a
//! dropped key reads exactly like one that was never inserted.
//!
//! Keys and values that would refer back to each other should be stored as
//! handles (an `Arc`, or an id into an arena owned by the caller) so that no
//! entry keeps its own key alive.

use std::hash::Hash;
use std::time::Duration;

use moka::sync::Cache;

use super::CacheStrategy;

/// Configuration for [`SoftStrategy`].
///
/// ```rust
/// # use cubecache::SoftConfig;
/// # use std::time::Duration;
/// let config = SoftConfig::new()
///     .max_entries(50_000)
///     .time_to_idle(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftConfig {
    /// Maximum number of resident entries. Default: 10,000.
    pub max_entries: u64,
    /// Entries untouched for this long are reclaimed. Default: none.
    pub time_to_idle: Option<Duration>,
}

impl Default for SoftConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            time_to_idle: None,
        }
    }
}

impl SoftConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of resident entries.
    ///
    /// A store always keeps room for at least one entry, so 0 behaves as 1.
    /// [`EngineBuilder::build`](crate::EngineBuilder::build) rejects 0.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    /// Reclaim entries that have not been read or written for `tti`.
    pub fn time_to_idle(mut self, tti: Duration) -> Self {
        self.time_to_idle = Some(tti);
        self
    }
}

/// Backing store whose entries may disappear without notice.
pub struct SoftStrategy<K, V> {
    cache: Cache<K, V>,
}

impl<K, V> SoftStrategy<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a store from the given configuration.
    pub fn new(config: &SoftConfig) -> Self {
        let mut builder = Cache::builder().max_capacity(config.max_entries.max(1));
        if let Some(tti) = config.time_to_idle {
            builder = builder.time_to_idle(tti);
        }
        Self {
            cache: builder.build(),
        }
    }
}

impl<K, V> CacheStrategy<K, V> for SoftStrategy<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "soft"
    }

    fn get(&self, key: &K) -> Option<V> {
        self.cache.get(key)
    }

    fn put(&mut self, key: K, value: V) -> Option<V> {
        let previous = self.cache.get(&key);
        self.cache.insert(key, value);
        previous
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        self.cache.remove(key)
    }

    fn clear(&mut self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks();
    }

    fn len(&self) -> usize {
        // entry_count lags behind maintenance; counting the live view does not.
        self.cache.run_pending_tasks();
        self.cache.iter().count()
    }

    fn snapshot(&self) -> Vec<(K, V)> {
        self.cache
            .iter()
            .map(|(k, v)| (K::clone(&k), v))
            .collect()
    }
}
