//! Memoization tables.
//!
//! [`MemoCache`] is a plain `HashMap` with hit/miss accounting. It backs the
//! per-pass address table of the [resolver][crate::resolver] and the per-state
//! score table of the [scoring strategy][crate::strategies::ModelScoringStrategy].
//! Hit counts are reported through `log::debug!` when a table is cleared, which
//! makes it easy to see how much a cycle-heavy heap benefits from memoization.

use std::collections::HashMap;
use std::hash::Hash;

use log::debug;

/// A memo table backed by [HashMap], counting hits and misses.
#[derive(Debug)]
pub struct MemoCache<K, V> {
    name: &'static str,
    map: HashMap<K, V>,
    hits: usize,
    misses: usize,
}

impl<K, V> MemoCache<K, V> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            map: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Returns the number of entries in the table.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Drops every entry and resets the counters.
    pub fn clear(&mut self) {
        if self.hits + self.misses > 0 {
            debug!(
                "{}: {} entries, {} hits, {} misses",
                self.name,
                self.map.len(),
                self.hits,
                self.misses
            );
        }
        self.map.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

impl<K, V> MemoCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    /// Looks up a key, counting the outcome.
    #[inline]
    pub fn get(&mut self, key: &K) -> Option<V> {
        match self.map.get(key) {
            Some(v) => {
                self.hits += 1;
                Some(v.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Looks up a key without touching the counters.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    #[inline]
    pub fn insert(&mut self, key: K, value: V) {
        self.map.insert(key, value);
    }
}
