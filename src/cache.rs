use indexmap::IndexMap;
use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Call counters reported by a `MemoCache`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Total lookups.
    pub calls: u64,
    /// Lookups that had to run the wrapped computation.
    pub misses: u64,
    /// Entries currently retained.
    pub entries: usize,
}

impl CacheStats {
    /// Lookups answered from the store.
    pub fn hits(&self) -> u64 {
        self.calls.saturating_sub(self.misses)
    }
}

/// Thread-safe memoizing store of computation results keyed by argument.
///
/// Once `capacity` entries are held, new keys are still computed on every
/// call but never retained; nothing is evicted.
pub struct MemoCache<K, V> {
    entries: RwLock<IndexMap<K, V>>,
    capacity: usize,
    calls: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Create a cache retaining at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
            capacity,
            calls: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the stored value for `key`, computing (and maybe storing) it on a miss.
    ///
    /// Errors from `compute` are returned as-is and never cached.
    pub fn get_or_try_insert_with<Q, E>(
        &self,
        key: &Q,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(value) = self
            .entries
            .read()
            .expect("memo cache poisoned")
            .get(key)
        {
            return Ok(value.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = compute()?;
        let mut entries = self.entries.write().expect("memo cache poisoned");
        if entries.len() < self.capacity && !entries.contains_key(key) {
            entries.insert(key.to_owned(), value.clone());
        }
        Ok(value)
    }

    /// True when `key` has a stored result.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries
            .read()
            .expect("memo cache poisoned")
            .contains_key(key)
    }

    /// Snapshot of call counters and entry count.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            calls: self.calls.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.read().expect("memo cache poisoned").len()
    }

    /// Returns `true` when nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
