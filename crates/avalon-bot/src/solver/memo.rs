//! Value-keyed cache for solver results.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

/// Hit/miss counters and size of one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Thread-safe map from structural keys to computed results.
///
/// The lock is never held while a value is computed, so recursive lookups are
/// fine. Two threads racing on one key may both compute it; the first insert
/// wins and both callers get the stored value.
#[derive(Debug)]
pub struct Memo<K, V> {
    enabled: bool,
    entries: RwLock<HashMap<K, V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K: Eq + Hash, V: Clone> Memo<K, V> {
    /// A disabled memo never stores anything.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let found = if self.enabled {
            self.entries.read().get(key).cloned()
        } else {
            None
        };
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Stores `value` unless the key is already present; returns the stored
    /// value either way.
    pub fn insert(&self, key: K, value: V) -> V {
        if !self.enabled {
            return value;
        }
        self.entries.write().entry(key).or_insert(value).clone()
    }

    /// Returns the cached value or computes, stores and returns a new one.
    /// Errors are passed through and never cached.
    pub fn get_or_try_insert_with<E, F>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(found) = self.get(&key) {
            return Ok(found);
        }
        let value = compute()?;
        Ok(self.insert(key, value))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> MemoStats {
        MemoStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn computes_once_per_key() {
        let memo: Memo<u32, u64> = Memo::new(true);
        let mut calls = 0;
        for _ in 0..3 {
            let value = memo
                .get_or_try_insert_with(7, || {
                    calls += 1;
                    Ok::<_, ()>(49)
                })
                .unwrap();
            assert_eq!(value, 49);
        }
        assert_eq!(calls, 1);
        assert_eq!(
            memo.stats(),
            MemoStats {
                hits: 2,
                misses: 1,
                entries: 1
            }
        );
    }

    #[test]
    fn first_insert_wins() {
        let memo: Memo<&str, i32> = Memo::new(true);
        assert_eq!(memo.insert("k", 1), 1);
        assert_eq!(memo.insert("k", 2), 1);
        assert_eq!(memo.get(&"k"), Some(1));
    }

    #[test]
    fn errors_are_not_cached() {
        let memo: Memo<u8, u8> = Memo::new(true);
        let failed: Result<u8, &str> = memo.get_or_try_insert_with(1, || Err("boom"));
        assert!(failed.is_err());
        assert!(memo.is_empty());
        assert_eq!(memo.get_or_try_insert_with(1, || Ok::<_, &str>(5)), Ok(5));
    }

    #[test]
    fn disabled_memo_never_stores() {
        let memo: Memo<u8, u8> = Memo::new(false);
        assert_eq!(memo.insert(1, 9), 9);
        assert!(memo.get(&1).is_none());
        assert!(memo.is_empty());
        assert_eq!(memo.stats().misses, 1);
    }

    #[test]
    fn clear_resets_entries_and_counters() {
        let memo: Memo<u8, u8> = Memo::new(true);
        memo.insert(1, 1);
        let _ = memo.get(&1);
        memo.clear();
        assert_eq!(memo.stats(), MemoStats::default());
    }

    #[test]
    fn concurrent_inserts_agree() {
        let memo: Arc<Memo<u32, u32>> = Arc::new(Memo::new(true));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let memo = Arc::clone(&memo);
                thread::spawn(move || {
                    (0..100)
                        .map(|key| memo.get_or_try_insert_with(key, || Ok::<_, ()>(key * 2)).unwrap())
                        .sum::<u32>()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), (0..100).map(|k| k * 2).sum::<u32>());
        }
        assert_eq!(memo.len(), 100);
    }
}
