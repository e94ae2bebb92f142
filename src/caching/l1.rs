//! L1 in-process cache
//!
//! Bounded map with per-entry TTL and least-recently-accessed eviction.
//! The entry map and the access-order deque live under a single lock so a
//! concurrent get/set pair cannot corrupt eviction order.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::CacheEntry;

#[derive(Debug)]
struct L1Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    /// Front = most recently accessed, back = eviction candidate.
    access_order: VecDeque<String>,
}

impl<V> L1Inner<V> {
    fn promote(&mut self, key: &str) {
        if let Some(pos) = self.access_order.iter().position(|k| k == key) {
            self.access_order.remove(pos);
        }
        self.access_order.push_front(key.to_string());
    }

    fn remove(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            if let Some(pos) = self.access_order.iter().position(|k| k == key) {
                self.access_order.remove(pos);
            }
        }
        removed
    }
}

/// Bounded in-process cache tier.
#[derive(Debug)]
pub struct L1Cache<V> {
    max_size: usize,
    default_ttl: Duration,
    inner: Arc<RwLock<L1Inner<V>>>,
}

impl<V: Clone> L1Cache<V> {
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        Self {
            max_size,
            default_ttl,
            inner: Arc::new(RwLock::new(L1Inner {
                entries: HashMap::new(),
                access_order: VecDeque::new(),
            })),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up a key. An entry past its TTL is purged on the spot and
    /// reported as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.write().unwrap();
        let expired = match inner.entries.get(key) {
            Some(entry) => entry.is_expired(),
            None => return None,
        };
        if expired {
            inner.remove(key);
            return None;
        }
        let value = {
            let entry = inner.entries.get_mut(key)?;
            entry.touch();
            entry.value.clone()
        };
        inner.promote(key);
        Some(value)
    }

    /// Insert a value. When the cache is full and the key is new, exactly
    /// one entry is evicted: the one with the oldest last access.
    pub fn set(&self, key: &str, value: V, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let mut inner = self.inner.write().unwrap();
        if !inner.entries.contains_key(key) && inner.entries.len() >= self.max_size {
            if let Some(victim) = inner.access_order.pop_back() {
                inner.entries.remove(&victim);
            }
        }
        inner.entries.insert(key.to_string(), CacheEntry::new(value, ttl));
        inner.promote(key);
    }

    pub fn delete(&self, key: &str) -> bool {
        self.inner.write().unwrap().remove(key)
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.entries.clear();
        inner.access_order.clear();
    }

    pub fn size(&self) -> usize {
        self.inner.read().unwrap().entries.len()
    }
}

impl<V> Clone for L1Cache<V> {
    fn clone(&self) -> Self {
        Self {
            max_size: self.max_size,
            default_ttl: self.default_ttl,
            inner: Arc::clone(&self.inner),
        }
    }
}
