//! Bounded match-result cache
//!
//! Maps (source, request URL) to the last verdict. Entries are kept in LRU
//! order; when an insert pushes the size past capacity, the oldest 5% of
//! capacity (at least one entry) are evicted in one batch.
//!
//! All operations serialize on one mutex. The critical section is a hash
//! lookup plus list relinking.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lru::LruCache;

use crate::error::EngineError;

/// Default number of cached verdicts (roughly 15-20 MB).
pub const DEFAULT_CAPACITY: usize = 50_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    src: String,
    req: String,
}

impl CacheKey {
    fn new(src: &str, req: &str) -> Self {
        Self {
            src: src.to_string(),
            req: req.to_string(),
        }
    }
}

/// Thread-safe LRU cache of block verdicts.
pub struct ResultCache {
    inner: Mutex<LruCache<CacheKey, bool>>,
    capacity: NonZeroUsize,
    batch: usize,
}

impl ResultCache {
    /// Create a cache holding at most `capacity` verdicts.
    pub fn new(capacity: usize) -> Result<Self, EngineError> {
        let capacity = NonZeroUsize::new(capacity).ok_or(EngineError::InvalidCapacity(capacity))?;
        Ok(Self {
            inner: Mutex::new(LruCache::unbounded()),
            capacity,
            batch: (capacity.get() / 20).max(1),
        })
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, bool>> {
        // a panic mid-operation cannot leave the LRU list inconsistent
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a verdict, marking it most recently used.
    pub fn get(&self, src: &str, req: &str) -> Option<bool> {
        self.lock().get(&CacheKey::new(src, req)).copied()
    }

    /// Store a verdict as most recently used, evicting a batch of the
    /// least recently used entries if the cache is over capacity.
    pub fn set(&self, src: &str, req: &str, blocked: bool) {
        let mut cache = self.lock();
        if cache.put(CacheKey::new(src, req), blocked).is_some() {
            return;
        }
        if cache.len() > self.capacity.get() {
            for _ in 0..self.batch {
                if cache.pop_lru().is_none() {
                    break;
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(ResultCache::new(0), Err(EngineError::InvalidCapacity(0))));
    }

    #[test]
    fn test_get_set() {
        let cache = ResultCache::new(10).expect("valid capacity");
        assert_eq!(cache.get("a", "b"), None);
        cache.set("a", "b", true);
        assert_eq!(cache.get("a", "b"), Some(true));
        cache.set("a", "b", false);
        assert_eq!(cache.get("a", "b"), Some(false));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_key_includes_source() {
        let cache = ResultCache::new(10).expect("valid capacity");
        cache.set("a.test", "http://x/", true);
        assert_eq!(cache.get("b.test", "http://x/"), None);
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let cache = ResultCache::new(100).expect("valid capacity");
        for i in 0..=100 {
            cache.set("src", &format!("http://x/{i}"), false);
        }
        assert!(cache.len() <= 100);
        assert_eq!(cache.len(), 96);
        assert_eq!(cache.get("src", "http://x/0"), None);
        assert_eq!(cache.get("src", "http://x/100"), Some(false));
    }

    #[test]
    fn test_capacity_one() {
        let cache = ResultCache::new(1).expect("valid capacity");
        cache.set("s", "a", true);
        cache.set("s", "b", true);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("s", "a"), None);
        assert_eq!(cache.get("s", "b"), Some(true));
    }

    #[test]
    fn test_get_refreshes_recency() {
        let cache = ResultCache::new(20).expect("valid capacity");
        for i in 0..20 {
            cache.set("src", &format!("k{i}"), false);
        }
        // k0 is oldest until touched
        assert_eq!(cache.get("src", "k0"), Some(false));
        cache.set("src", "k20", false);

        assert_eq!(cache.get("src", "k0"), Some(false));
        assert_eq!(cache.get("src", "k1"), None);
        assert_eq!(cache.get("src", "k2"), Some(false));
    }

    #[test]
    fn test_update_does_not_evict() {
        let cache = ResultCache::new(2).expect("valid capacity");
        cache.set("s", "a", false);
        cache.set("s", "b", false);
        cache.set("s", "a", true);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("s", "b"), Some(false));
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(ResultCache::new(500).expect("valid capacity"));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..1_000 {
                        let req = format!("http://x/{t}/{i}");
                        cache.set("src", &req, i % 2 == 0);
                        let _ = cache.get("src", &req);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("worker panicked");
        }
        assert!(cache.len() <= 500);
    }
}
