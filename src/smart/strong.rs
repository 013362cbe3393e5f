//! Strong-reference backing store.

use std::collections::HashMap;
use std::hash::Hash;

use super::CacheStrategy;

/// Backing store holding ordinary references.
///
/// Entries survive until removed or cleared. Use it when recomputing a value
/// costs more than keeping it resident.
#[derive(Debug)]
pub struct StrongStrategy<K, V> {
    map: HashMap<K, V>,
}

impl<K, V> StrongStrategy<K, V> {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }
}

impl<K, V> Default for StrongStrategy<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> CacheStrategy<K, V> for StrongStrategy<K, V>
where
    K: Hash + Eq + Clone + Send,
    V: Clone + Send,
{
    fn name(&self) -> &'static str {
        "strong"
    }

    fn get(&self, key: &K) -> Option<V> {
        self.map.get(key).cloned()
    }

    fn put(&mut self, key: K, value: V) -> Option<V> {
        self.map.insert(key, value)
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        self.map.remove(key)
    }

    fn clear(&mut self) {
        self.map.clear();
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn snapshot(&self) -> Vec<(K, V)> {
        self.map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
