//! Fixed-capacity LRU map shared between tasks.
//!
//! TTL is not enforced here; callers that need freshness store their own
//! timestamp in the value (see `ai_data_cache`).

use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

/// Thread-safe LRU cache. Every call takes the single internal lock, so
/// concurrent callers observe a linearizable sequence of operations.
pub struct BoundedCache<K: Hash + Eq, V> {
    inner: Mutex<LruCache<K, V>>,
}

impl<K: Hash + Eq, V: Clone> BoundedCache<K, V> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<K, V>> {
        // Each critical section is a single LruCache call, so the map is
        // consistent even if a holder panicked.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up `key` and mark it most recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        self.lock().get(key).cloned()
    }

    /// Insert or replace. A new key evicts the least recently used entry
    /// when full; replacing an existing key never evicts.
    pub fn put(&self, key: K, value: V) {
        self.lock().put(key, value);
    }

    pub fn remove(&self, key: &K) {
        self.lock().pop(key);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    /// Peek without touching recency.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.lock().peek(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn cache(capacity: usize) -> BoundedCache<&'static str, u32> {
        BoundedCache::new(NonZeroUsize::new(capacity).unwrap())
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let c = cache(2);
        c.put("a", 1);
        c.put("b", 2);
        c.put("c", 3);

        assert_eq!(c.len(), 2);
        assert_eq!(c.get(&"a"), None);
        assert_eq!(c.get(&"b"), Some(2));
        assert_eq!(c.get(&"c"), Some(3));
    }

    #[test]
    fn test_get_promotes() {
        let c = cache(2);
        c.put("a", 1);
        c.put("b", 2);
        assert_eq!(c.get(&"a"), Some(1));
        c.put("c", 3);

        assert_eq!(c.get(&"a"), Some(1));
        assert_eq!(c.get(&"b"), None);
    }

    #[test]
    fn test_update_does_not_evict() {
        let c = cache(2);
        c.put("a", 1);
        c.put("b", 2);
        c.put("a", 10);

        assert_eq!(c.len(), 2);
        assert_eq!(c.get(&"a"), Some(10));
        assert_eq!(c.get(&"b"), Some(2));
    }

    #[test]
    fn test_remove_and_clear() {
        let c = cache(3);
        c.put("a", 1);
        c.remove(&"a");
        c.remove(&"missing");
        assert!(c.is_empty());

        c.put("b", 2);
        c.put("c", 3);
        c.clear();
        assert_eq!(c.len(), 0);
        assert_eq!(c.capacity(), 3);
    }

    #[test]
    fn test_concurrent_puts_respect_capacity() {
        let c: Arc<BoundedCache<u32, u32>> = Arc::new(BoundedCache::new(NonZeroUsize::new(8).unwrap()));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let c = Arc::clone(&c);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        c.put(t * 1000 + i, i);
                        let _ = c.get(&(t * 1000 + i / 2));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(c.len(), 8);
    }
}
