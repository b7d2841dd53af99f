//! Bounded, TTL-based key/value cache.
//!
//! Two layers of expiry apply to every cached entity:
//!
//! 1. A cache-level time-to-live measured from the write, independent of
//!    read activity (default 1 hour).
//! 2. The entity's own expiry, reported through [`Expires`] and checked on
//!    read by [`ExpiringCache::get_unexpired`].
//!
//! Either one invalidates a read.
//!
//! # Concurrency
//!
//! `get`, `put` and `invalidate` are safe from any number of tasks without
//! external locking, and clones share the same storage. The cache does not
//! deduplicate concurrent computation: two callers that miss on the same key
//! will both compute a value, and the last `put` wins.

use moka::sync::Cache;
use std::hash::Hash;
use std::time::Duration;
use tracing::trace;

/// Default maximum number of entries.
pub const DEFAULT_CACHE_CAPACITY: u64 = 1000;

/// Default write-time TTL (1 hour).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// A value that carries its own expiry.
pub trait Expires {
    /// Whether the value must no longer be served.
    fn is_expired(&self) -> bool;
}

/// Thread-safe bounded cache with write-time TTL.
pub struct ExpiringCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<K, V>,
}

impl<K, V> ExpiringCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache with the default capacity and TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity_and_ttl(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL)
    }

    /// Create a cache with a custom capacity and write-time TTL.
    #[must_use]
    pub fn with_capacity_and_ttl(capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Store `value` under `key`, overwriting any previous entry.
    pub fn put(&self, key: K, value: V) {
        self.inner.insert(key, value);
    }

    /// Get the entry for `key` if its cache-level TTL has not elapsed.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key)
    }

    /// Remove the entry for `key`, if any.
    pub fn invalidate(&self, key: &K) {
        self.inner.invalidate(key);
    }

    /// Approximate number of live entries.
    ///
    /// Eviction is processed lazily, so this may lag behind recent writes.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }
}

impl<K, V> ExpiringCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Expires + Send + Sync + 'static,
{
    /// Get the entry for `key` only if neither expiry layer has passed.
    ///
    /// An entry found past its own expiry is invalidated before returning.
    #[must_use]
    pub fn get_unexpired(&self, key: &K) -> Lookup<V> {
        match self.inner.get(key) {
            Some(value) if value.is_expired() => {
                trace!(target: "sand.cache", "Entry past its own expiry, evicting");
                self.inner.invalidate(key);
                Lookup::Expired
            }
            Some(value) => Lookup::Hit(value),
            None => Lookup::Miss,
        }
    }
}

impl<K, V> Clone for ExpiringCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> Default for ExpiringCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of [`ExpiringCache::get_unexpired`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<V> {
    /// Fresh entry.
    Hit(V),
    /// No entry, or the cache-level TTL elapsed.
    Miss,
    /// Entry existed but its own expiry had passed; it has been removed.
    Expired,
}

impl<V> Lookup<V> {
    /// The fresh value, if any.
    pub fn hit(self) -> Option<V> {
        match self {
            Lookup::Hit(value) => Some(value),
            Lookup::Miss | Lookup::Expired => None,
        }
    }

    /// Metric label for this outcome.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Lookup::Hit(_) => "hit",
            Lookup::Miss => "miss",
            Lookup::Expired => "expired",
        }
    }
}
