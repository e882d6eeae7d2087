//! Shared, content-addressed embedding cache.
//!
//! Keys are blake3 content addresses over the provider's cache namespace
//! and the text (see `types::content_address`), so a key always maps to the
//! same vector and concurrent writers can only ever write identical values.
//! Entries are only evicted when `embed_cached` finds one whose length
//! disagrees with its provider.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct EmbeddingCache {
    entries: DashMap<String, Arc<Vec<f32>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a vector by content address
    pub fn get(&self, key: &str) -> Option<Arc<Vec<f32>>> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value().clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert a vector unless the key is already present; returns the stored
    /// vector either way.
    pub fn insert(&self, key: String, vector: Vec<f32>) -> Arc<Vec<f32>> {
        self.entries
            .entry(key)
            .or_insert_with(|| Arc::new(vector))
            .value()
            .clone()
    }

    /// Drop the entry under `key`, if any
    pub fn evict(&self, key: &str) -> Option<Arc<Vec<f32>>> {
        self.entries.remove(key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (hits, misses) since creation
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_write_wins() {
        let cache = EmbeddingCache::new();
        let stored = cache.insert("k".to_string(), vec![1.0]);
        let again = cache.insert("k".to_string(), vec![2.0]);
        assert_eq!(*stored, vec![1.0]);
        assert_eq!(*again, vec![1.0]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn tracks_hits_and_misses() {
        let cache = EmbeddingCache::new();
        assert!(cache.get("missing").is_none());
        cache.insert("k".to_string(), vec![0.5]);
        assert!(cache.get("k").is_some());
        assert_eq!(cache.stats(), (1, 1));
    }
}
