//! Local object cache.
//!
//! The cache is split into a single [`Writer`], owned by the watch session
//! of its kind, and any number of cloneable read-only [`Store`] handles.

use crate::object::ObjectKey;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

type Cache<K> = Arc<RwLock<BTreeMap<ObjectKey, Arc<K>>>>;

/// Creates an empty cache and returns its reader and writer halves.
#[must_use]
pub fn store<K>() -> (Store<K>, Writer<K>) {
    let cache: Cache<K> = Arc::new(RwLock::new(BTreeMap::new()));
    (
        Store {
            cache: Arc::clone(&cache),
        },
        Writer { cache },
    )
}

/// Read-only handle to a kind's cached objects.
#[derive(Debug)]
pub struct Store<K> {
    cache: Cache<K>,
}

// Manual impl: cloning the handle must not require `K: Clone`.
impl<K> Clone for Store<K> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<K> Store<K> {
    /// Returns the cached object for `key`, if any.
    pub fn get(&self, key: &ObjectKey) -> Option<Arc<K>> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        cache.get(key).cloned()
    }

    /// Point-in-time copy of every cached object, ordered by key.
    pub fn list(&self) -> Vec<Arc<K>> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        cache.values().cloned().collect()
    }

    /// Point-in-time copy of every cached key.
    pub fn keys(&self) -> Vec<ObjectKey> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        cache.keys().cloned().collect()
    }

    /// Whether `key` is cached.
    pub fn contains(&self, key: &ObjectKey) -> bool {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        cache.contains_key(key)
    }

    /// Number of cached objects.
    pub fn len(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive write half of a cache.
#[derive(Debug)]
pub struct Writer<K> {
    cache: Cache<K>,
}

impl<K> Writer<K> {
    /// Inserts or replaces the object for `key`, returning the previous one.
    pub fn put(&mut self, key: ObjectKey, obj: Arc<K>) -> Option<Arc<K>> {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.insert(key, obj)
    }

    /// Removes the object for `key`. No-op if absent.
    pub fn delete(&mut self, key: &ObjectKey) -> Option<Arc<K>> {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.remove(key)
    }

    /// Returns a reader over the same cache.
    #[must_use]
    pub fn as_reader(&self) -> Store<K> {
        Store {
            cache: Arc::clone(&self.cache),
        }
    }
}
