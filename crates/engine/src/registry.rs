// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keyed, shared state stores injected into the engines

use parking_lot::Mutex;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Cloneable handle over one process-wide map.
///
/// Every operation takes the lock for its own duration only, so each key
/// is read and mutated atomically and no lock is ever held across an await.
pub struct Registry<K, V> {
    inner: Arc<Mutex<HashMap<K, V>>>,
}

impl<K, V> Clone for Registry<K, V> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<K, V> Default for Registry<K, V> {
    fn default() -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())) }
    }
}

impl<K: Eq + Hash, V: Clone> Registry<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: HashMap<K, V>) -> Self {
        Self { inner: Arc::new(Mutex::new(map)) }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().get(key).cloned()
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().contains_key(key)
    }

    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.inner.lock().insert(key, value)
    }

    /// Mutate the entry for `key` in place; `None` if it is absent.
    pub fn update<Q, R>(&self, key: &Q, f: impl FnOnce(&mut V) -> R) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().get_mut(key).map(f)
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().remove(key)
    }

    pub fn values(&self) -> Vec<V> {
        self.inner.lock().values().cloned().collect()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Registry<K, V> {
    /// Point-in-time copy of the whole map (for persistence).
    pub fn snapshot(&self) -> HashMap<K, V> {
        self.inner.lock().clone()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
