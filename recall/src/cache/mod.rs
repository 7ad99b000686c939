//! Namespaced, TTL-aware in-process cache (§4.3). A single `Arc<Mutex<LruCache>>`
//! per kind, each with its own TTL, sharing one concurrency pattern across
//! embeddings, search results, and metadata.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::config::CacheConfig;

/// The six cacheable kinds named in §4.3, each with its own TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Embedding,
    EntityGraph,
    Memory,
    Metadata,
    SearchResult,
    List,
}

impl CacheKind {
    fn namespace(self) -> &'static str {
        match self {
            Self::Embedding => "embedding",
            Self::EntityGraph => "entity_graph",
            Self::Memory => "memory",
            Self::Metadata => "metadata",
            Self::SearchResult => "search",
            Self::List => "list",
        }
    }

    fn ttl(self, config: &CacheConfig) -> Duration {
        let secs = match self {
            Self::Embedding => config.embedding_ttl_secs,
            Self::EntityGraph => config.entity_graph_ttl_secs,
            Self::Memory => config.memory_ttl_secs,
            Self::Metadata => config.metadata_ttl_secs,
            Self::SearchResult => config.search_result_ttl_secs,
            Self::List => config.list_ttl_secs,
        };
        Duration::from_secs(secs)
    }
}

struct Entry {
    value: String,
    expires_at: Instant,
}

/// Cache hit/miss counters surfaced at component boundaries (§9's logging
/// requirement for Cache get/set operations).
#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// In-process, bounded, TTL-aware key/value cache. When `enabled` is false,
/// every operation is a transparent passthrough (§4.3's degrade-to-passthrough
/// fallback policy).
#[derive(Clone)]
pub struct Cache {
    inner: Arc<Mutex<LruCache<String, Entry>>>,
    stats: Arc<Mutex<CacheStats>>,
    config: CacheConfig,
}

impl Cache {
    pub fn new(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity.max(1)).expect("capacity must be non-zero");
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(capacity))),
            stats: Arc::new(Mutex::new(CacheStats::default())),
            config,
        }
    }

    fn key(&self, kind: CacheKind, id: &str) -> String {
        format!("{}:{}:{}", self.config.key_prefix, kind.namespace(), id)
    }

    pub fn get(&self, kind: CacheKind, id: &str) -> Option<String> {
        if !self.config.enabled {
            return None;
        }
        let key = self.key(kind, id);
        let mut cache = self.inner.lock().unwrap();
        let mut stats = self.stats.lock().unwrap();

        match cache.get(&key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                stats.hits += 1;
                Some(entry.value.clone())
            }
            Some(_) => {
                cache.pop(&key);
                stats.misses += 1;
                None
            }
            None => {
                stats.misses += 1;
                None
            }
        }
    }

    pub fn set(&self, kind: CacheKind, id: &str, value: String) {
        if !self.config.enabled {
            return;
        }
        let key = self.key(kind, id);
        let ttl = kind.ttl(&self.config);
        let mut cache = self.inner.lock().unwrap();
        cache.put(
            key,
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn delete(&self, kind: CacheKind, id: &str) {
        if !self.config.enabled {
            return;
        }
        let key = self.key(kind, id);
        let mut cache = self.inner.lock().unwrap();
        cache.pop(&key);
    }

    /// Cursor-based scan-and-remove matching a glob-style prefix pattern
    /// (§4.3: "never a blocking wildcard enumerate" — bounded by the LRU's
    /// own capacity, not an external keyspace scan).
    pub fn invalidate_pattern(&self, pattern: &str) {
        if !self.config.enabled {
            return;
        }
        let prefix = pattern.trim_end_matches('*');
        let mut cache = self.inner.lock().unwrap();
        let stale: Vec<String> = cache
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in stale {
            cache.pop(&key);
        }
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.lock().unwrap()
    }

    /// Stable hex digest used as the cache key suffix for embedding lookups
    /// (§4.3's `text_hash`).
    pub fn text_hash(text: &str) -> String {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        format!("{:x}", hasher.finish())
    }
}

/// Invalidation helper for the memory-mutation rules in §4.3: on create/
/// update/delete of memory `M` in tenant `T`, drop `memory:{M}`, every
/// `list:{T}:*`, and every `search:*:{T}:*`.
pub fn invalidate_memory(cache: &Cache, tenant_id: &str, memory_id: &str) {
    cache.delete(CacheKind::Memory, memory_id);
    cache.invalidate_pattern(&format!(
        "{}:{}:{}",
        cache.config.key_prefix,
        CacheKind::List.namespace(),
        tenant_id
    ));
    cache.invalidate_pattern(&format!("{}:{}:", cache.config.key_prefix, CacheKind::SearchResult.namespace()));
}

/// Invalidation for entity mutations: drop the cached neighborhood for the
/// case-folded entity name (§4.3).
pub fn invalidate_entity_graph(cache: &Cache, entity_name: &str) {
    cache.delete(CacheKind::EntityGraph, &entity_name.to_lowercase());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CacheConfig {
        CacheConfig {
            enabled: true,
            key_prefix: "recall".into(),
            capacity: 100,
            embedding_ttl_secs: 2_592_000,
            entity_graph_ttl_secs: 86_400,
            memory_ttl_secs: 43_200,
            metadata_ttl_secs: 21_600,
            search_result_ttl_secs: 3_600,
            list_ttl_secs: 300,
        }
    }

    #[test]
    fn test_hit_after_set() {
        let cache = Cache::new(test_config());
        cache.set(CacheKind::Memory, "m1", "payload".into());
        assert_eq!(cache.get(CacheKind::Memory, "m1"), Some("payload".into()));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_miss_counts_separately_from_hit() {
        let cache = Cache::new(test_config());
        assert_eq!(cache.get(CacheKind::Memory, "missing"), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_disabled_cache_is_passthrough() {
        let mut config = test_config();
        config.enabled = false;
        let cache = Cache::new(config);
        cache.set(CacheKind::Memory, "m1", "payload".into());
        assert_eq!(cache.get(CacheKind::Memory, "m1"), None);
    }

    #[test]
    fn test_invalidate_pattern_removes_matching_keys() {
        let cache = Cache::new(test_config());
        cache.set(CacheKind::List, "t1", "page1".into());
        invalidate_memory(&cache, "t1", "m1");
        assert_eq!(cache.get(CacheKind::List, "t1"), None);
    }

    #[test]
    fn test_text_hash_is_stable() {
        assert_eq!(Cache::text_hash("hello"), Cache::text_hash("hello"));
        assert_ne!(Cache::text_hash("hello"), Cache::text_hash("world"));
    }
}
