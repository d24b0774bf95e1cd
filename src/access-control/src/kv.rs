//! Concurrent keyed storage primitive
//!
//! `KeyedStore` backs every policy index. Writers may run concurrently while a
//! policy tree is being ingested; afterwards the store is only read.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::hash::Hash;

/// Thread-safe mapping from keys to values
///
/// Values are cloned out on read so no shard lock outlives a call.
#[derive(Debug)]
pub struct KeyedStore<V, K = String>
where
    K: Eq + Hash,
{
    entries: DashMap<K, V>,
}

impl<V, K> KeyedStore<V, K>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Insert or replace a value
    pub fn set(&self, key: K, value: V) {
        self.entries.insert(key, value);
    }

    /// Insert only if the key is absent
    ///
    /// Returns `false` and leaves the existing value untouched when the key is
    /// already present. The check and the insert happen under one shard lock.
    pub fn insert_new(&self, key: K, value: V) -> bool {
        match self.entries.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    /// Look up a value; `None` means the key is absent
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Remove a value, returning it if it was present
    pub fn delete(&self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(_, value)| value)
    }

    /// Whether a key is present
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Snapshot of all values, in no particular order
    pub fn values(&self) -> Vec<V> {
        self.entries.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Snapshot of all keys, in no particular order
    pub fn keys(&self) -> Vec<K> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Visit every entry and collect those the predicate selects
    ///
    /// Always a full traversal; the predicate cannot stop the scan early.
    pub fn filter<F>(&self, mut predicate: F) -> Vec<(K, V)>
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.entries
            .iter()
            .filter(|entry| predicate(entry.key(), entry.value()))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V, K> Default for KeyedStore<V, K>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
