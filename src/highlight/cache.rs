//! Caching for annotation results
//!
//! Annotating identical content with the same guidance context always yields
//! markup we have already paid an API call for. Results are kept in a small
//! TTL-bounded LRU keyed by a content hash.

use crate::types::AnnotationContext;
use lru::LruCache;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Content-based cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnnotationKey(u64);

impl AnnotationKey {
    /// Create a key from the content and its guidance context
    pub fn from_request(content: &str, context: &AnnotationContext) -> Self {
        use std::collections::hash_map::DefaultHasher;
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        context.hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// Cached annotation markup
#[derive(Debug, Clone)]
struct CachedMarkup {
    markup: String,
    cached_at: Instant,
}

impl CachedMarkup {
    fn new(markup: String) -> Self {
        Self {
            markup,
            cached_at: Instant::now(),
        }
    }

    fn is_valid(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() < ttl
    }
}

/// LRU cache for annotation results
///
/// Capacity must be non-zero.
pub struct AnnotationCache {
    cache: RwLock<LruCache<AnnotationKey, CachedMarkup>>,
    ttl: Duration,
}

impl AnnotationCache {
    pub fn new(capacity: usize, ttl_seconds: u64) -> Self {
        Self {
            cache: RwLock::new(LruCache::new(NonZeroUsize::new(capacity).unwrap())),
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    /// Get cached markup if present and not expired
    pub fn get(&self, key: &AnnotationKey) -> Option<String> {
        let mut cache = self.cache.write().ok()?;
        cache.get(key).and_then(|entry| {
            if entry.is_valid(self.ttl) {
                Some(entry.markup.clone())
            } else {
                None
            }
        })
    }

    /// Insert markup into the cache
    pub fn insert(&self, key: AnnotationKey, markup: String) {
        if let Ok(mut cache) = self.cache.write() {
            cache.put(key, CachedMarkup::new(markup));
        }
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AnnotationCache {
    fn default() -> Self {
        // Capacity sized for a single reviewer session
        Self::new(128, 3600)
    }
}
