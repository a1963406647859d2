//! Concurrency-safe key/value store shared by the render and syntax caches.

use std::{collections::HashMap, hash::Hash, sync::RwLock};

use super::lock;

const SOURCE: &str = "cache::store";

/// An unbounded map guarded by a reader/writer lock.
///
/// Entries never expire. They leave only through [`Cache::delete`],
/// [`Cache::clear`] or a wholesale [`Cache::replace_all`].
#[derive(Debug)]
pub struct Cache<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        lock::read(&self.entries, SOURCE, "get").get(key).cloned()
    }

    pub fn set(&self, key: K, value: V) {
        lock::write(&self.entries, SOURCE, "set").insert(key, value);
    }

    /// Remove `key`. Removing an absent key is a no-op.
    pub fn delete<Q>(&self, key: &Q)
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        lock::write(&self.entries, SOURCE, "delete").remove(key);
    }

    pub fn clear(&self) {
        lock::write(&self.entries, SOURCE, "clear").clear();
    }

    /// Swap in `entries` as the complete contents. Keys absent from the new
    /// map are gone afterwards.
    ///
    /// The content repository does not go through here: its id index is part
    /// of the snapshot it publishes, so the index and the ordered list swap
    /// together.
    pub fn replace_all(&self, entries: HashMap<K, V>) {
        *lock::write(&self.entries, SOURCE, "replace_all") = entries;
    }

    pub fn len(&self) -> usize {
        lock::read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for Cache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
