use std::{
    collections::{HashMap, VecDeque},
    time::Duration,
};

use tokio::time::Instant;

use super::hash::ContentHash;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Size-bounded map keyed by content hash with optional per-entry TTL.
///
/// Eviction follows first-insertion order: neither lookups nor overwrites move a key
/// towards the back, so the first key ever inserted is the first one evicted.
/// A `max_size` of zero disables caching.
#[derive(Debug)]
pub struct BoundedCache<V> {
    entries: HashMap<ContentHash, CacheEntry<V>>,
    order: VecDeque<ContentHash>,
    max_size: usize,
    ttl: Option<Duration>,
}

impl<V: Clone> BoundedCache<V> {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            max_size,
            ttl: None,
        }
    }

    pub fn with_ttl(max_size: usize, ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Self::new(max_size)
        }
    }

    pub fn get(&mut self, key: &ContentHash) -> Option<V> {
        let expired = match (self.entries.get(key), self.ttl) {
            (None, _) => return None,
            (Some(entry), Some(ttl)) => entry.inserted_at.elapsed() > ttl,
            (Some(_), None) => false,
        };
        if expired {
            self.remove(key);
            return None;
        }
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn put(&mut self, key: ContentHash, value: V) {
        if self.max_size == 0 {
            return;
        }
        let entry = CacheEntry {
            value,
            inserted_at: Instant::now(),
        };
        if self.entries.insert(key.clone(), entry).is_none() {
            self.order.push_back(key);
        }
        while self.entries.len() > self.max_size {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove(&mut self, key: &ContentHash) {
        self.entries.remove(key);
        self.order.retain(|existing| existing != key);
    }
}
