mod bounded;
mod hash;

use std::time::Duration;

use parking_lot::Mutex;

use crate::{config::CacheConfig, domain::ClassificationResult};

pub use bounded::BoundedCache;
pub use hash::{content_hash, ContentHash};

/// Client tier: size-bounded only.
pub type ClientCache = BoundedCache<ClassificationResult>;

/// Server tier: bounded with TTL, shared across concurrent classifications.
#[derive(Debug)]
pub struct ServerCache {
    inner: Mutex<BoundedCache<ClassificationResult>>,
}

impl ServerCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(BoundedCache::with_ttl(max_size, ttl)),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_size, config.ttl)
    }

    pub fn get(&self, key: &ContentHash) -> Option<ClassificationResult> {
        self.inner.lock().get(key)
    }

    pub fn put(&self, key: ContentHash, value: ClassificationResult) {
        self.inner.lock().put(key, value);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
