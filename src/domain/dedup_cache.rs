//! Bounded recency cache answering "have I seen this key before?".
//!
//! [`DedupCache`] holds three independent key spaces (signatures, mints,
//! derived event ids), each a strict LRU cache with its own capacity. There
//! is no age-based expiry: entries leave only under capacity pressure.
//! The cache is process-local and not persisted, so downstream writes
//! must stay idempotent.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lru::LruCache;

/// Capacities of the three key spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupCapacities {
    /// Transaction signatures. Largest: every transaction yields one.
    pub signatures: usize,
    /// Token mints.
    pub mints: usize,
    /// Composite event ids for records without a signature.
    pub event_ids: usize,
}

impl Default for DedupCapacities {
    fn default() -> Self {
        Self {
            signatures: 50_000,
            mints: 10_000,
            event_ids: 10_000,
        }
    }
}

/// Which key space a lookup targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySpace {
    /// Transaction signatures.
    Signature,
    /// Token mints.
    Mint,
    /// Composite event ids.
    EventId,
}

/// Creates one key space. A capacity of zero is treated as one.
fn key_space(capacity: usize) -> Mutex<LruCache<String, ()>> {
    let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
    Mutex::new(LruCache::new(capacity))
}

/// Three independent LRU key spaces behind short-lived locks.
#[derive(Debug)]
pub struct DedupCache {
    signatures: Mutex<LruCache<String, ()>>,
    mints: Mutex<LruCache<String, ()>>,
    event_ids: Mutex<LruCache<String, ()>>,
}

impl DedupCache {
    /// Creates a cache with the given per-space capacities.
    #[must_use]
    pub fn new(capacities: DedupCapacities) -> Self {
        Self {
            signatures: key_space(capacities.signatures),
            mints: key_space(capacities.mints),
            event_ids: key_space(capacities.event_ids),
        }
    }

    fn space(&self, space: KeySpace) -> MutexGuard<'_, LruCache<String, ()>> {
        let lock = match space {
            KeySpace::Signature => &self.signatures,
            KeySpace::Mint => &self.mints,
            KeySpace::EventId => &self.event_ids,
        };
        // Poisoned caches are still structurally valid.
        lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` if `key` is present. Does not change recency.
    #[must_use]
    pub fn seen(&self, space: KeySpace, key: &str) -> bool {
        self.space(space).contains(key)
    }

    /// Records `key` and returns `true` only if it was absent.
    ///
    /// Present keys are promoted to most-recently-used and `false` is
    /// returned. At capacity, inserting evicts the least-recently-used
    /// key. Check and insert happen under one lock acquisition.
    #[must_use]
    pub fn check_and_mark(&self, space: KeySpace, key: &str) -> bool {
        let mut cache = self.space(space);
        if cache.contains(key) {
            cache.promote(key);
            false
        } else {
            cache.put(key.to_string(), ());
            true
        }
    }

    /// Idempotent insert; refreshes recency.
    pub fn mark(&self, space: KeySpace, key: &str) {
        self.space(space).put(key.to_string(), ());
    }

    /// Number of keys held in one space.
    #[must_use]
    pub fn len(&self, space: KeySpace) -> usize {
        self.space(space).len()
    }

    /// Maximum number of keys one space holds.
    #[must_use]
    pub fn capacity(&self, space: KeySpace) -> usize {
        self.space(space).cap().get()
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(DedupCapacities::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_check_and_mark_wins() {
        let cache = DedupCache::default();
        assert!(cache.check_and_mark(KeySpace::Signature, "sig"));
        assert!(!cache.check_and_mark(KeySpace::Signature, "sig"));
        assert!(!cache.check_and_mark(KeySpace::Signature, "sig"));
    }

    #[test]
    fn key_spaces_are_independent() {
        let cache = DedupCache::default();
        assert!(cache.check_and_mark(KeySpace::Signature, "k"));
        assert!(cache.check_and_mark(KeySpace::Mint, "k"));
        assert!(cache.check_and_mark(KeySpace::EventId, "k"));
        assert!(!cache.seen(KeySpace::Mint, "other"));
    }

    fn sized(capacity: usize) -> DedupCache {
        DedupCache::new(DedupCapacities {
            signatures: capacity,
            mints: capacity,
            event_ids: capacity,
        })
    }

    #[test]
    fn overflow_evicts_least_recently_used() {
        let cache = sized(3);
        for key in ["a", "b", "c", "d"] {
            assert!(cache.check_and_mark(KeySpace::Signature, key));
        }
        assert_eq!(cache.len(KeySpace::Signature), 3);
        assert!(!cache.seen(KeySpace::Signature, "a"));
        assert!(cache.seen(KeySpace::Signature, "b"));
        assert!(cache.seen(KeySpace::Signature, "c"));
        assert!(cache.seen(KeySpace::Signature, "d"));
    }

    #[test]
    fn check_and_mark_promotes_but_seen_does_not() {
        let cache = sized(2);
        cache.mark(KeySpace::Mint, "a");
        cache.mark(KeySpace::Mint, "b");

        // Reading "a" leaves it as the eviction candidate.
        assert!(cache.seen(KeySpace::Mint, "a"));
        cache.mark(KeySpace::Mint, "c");
        assert!(!cache.seen(KeySpace::Mint, "a"));
        assert!(cache.seen(KeySpace::Mint, "b"));

        // A repeated check promotes "b" past "c".
        assert!(!cache.check_and_mark(KeySpace::Mint, "b"));
        cache.mark(KeySpace::Mint, "d");
        assert!(cache.seen(KeySpace::Mint, "b"));
        assert!(!cache.seen(KeySpace::Mint, "c"));
    }

    #[test]
    fn evicted_key_is_new_again() {
        let cache = DedupCache::new(DedupCapacities {
            signatures: 1,
            mints: 1,
            event_ids: 1,
        });
        assert!(cache.check_and_mark(KeySpace::Signature, "x"));
        assert!(cache.check_and_mark(KeySpace::Signature, "y"));
        assert!(cache.check_and_mark(KeySpace::Signature, "x"));
        assert_eq!(cache.len(KeySpace::Signature), 1);
    }

    #[test]
    fn zero_capacity_behaves_as_one() {
        let cache = sized(0);
        assert_eq!(cache.capacity(KeySpace::EventId), 1);
        assert_eq!(cache.len(KeySpace::EventId), 0);
        assert!(cache.check_and_mark(KeySpace::EventId, "e1"));
        assert!(cache.check_and_mark(KeySpace::EventId, "e2"));
        assert!(!cache.seen(KeySpace::EventId, "e1"));
    }

    #[test]
    fn mark_is_idempotent() {
        let cache = DedupCache::default();
        cache.mark(KeySpace::Mint, "m");
        cache.mark(KeySpace::Mint, "m");
        assert_eq!(cache.len(KeySpace::Mint), 1);
        assert!(cache.seen(KeySpace::Mint, "m"));
    }
}
