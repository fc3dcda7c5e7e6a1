//! TTL cache with an injected clock
//!
//! Entries are never evicted on read: an expired entry is still returned,
//! marked stale, so callers can serve it while revalidating.

use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

// ============================================================================
// Clock
// ============================================================================

/// Time source for freshness checks
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Monotonic system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(|e| e.into_inner());
        self.base + offset
    }
}

// ============================================================================
// Cache
// ============================================================================

/// TTLs per data domain
#[derive(Debug, Clone, PartialEq)]
pub struct CacheTtls {
    /// Fishing summaries (default: 24 hours, under the provider's 72-96h refresh)
    pub fishing: Duration,
    /// Remote composite scores and environmental readings (default: 1 hour)
    pub environmental: Duration,
    /// Species and population summaries (default: 24 hours)
    pub species: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            fishing: Duration::from_secs(24 * 60 * 60),
            environmental: Duration::from_secs(60 * 60),
            species: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Stored value with its write time
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub stored_at: Instant,
}

/// Result of a cache read
#[derive(Debug, Clone)]
pub struct CacheLookup<V> {
    pub value: V,
    pub age: Duration,
    /// False once the entry is older than the TTL
    pub fresh: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub fresh_entries: usize,
    pub stale_entries: usize,
}

/// Key to entry map with a fixed TTL
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    /// Create with the system clock
    pub fn with_ttl(ttl: Duration) -> Self {
        Self::new(ttl, Arc::new(SystemClock))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Read an entry, fresh or stale
    pub fn get(&self, key: &str) -> Option<CacheLookup<V>> {
        let now = self.clock.now();
        self.entries.get(key).map(|entry| {
            let age = now.saturating_duration_since(entry.stored_at);
            CacheLookup {
                value: entry.value.clone(),
                age,
                fresh: age < self.ttl,
            }
        })
    }

    /// Read an entry only if it is still fresh
    pub fn get_fresh(&self, key: &str) -> Option<V> {
        self.get(key).filter(|l| l.fresh).map(|l| l.value)
    }

    pub fn set(&self, key: &str, value: V) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: self.clock.now(),
            },
        );
        debug!(key = %key, entries = self.entries.len(), "Cache entry stored");
    }

    /// Remove an entry; returns whether one existed
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let fresh_entries = self
            .entries
            .iter()
            .filter(|e| now.saturating_duration_since(e.stored_at) < self.ttl)
            .count();
        let total_entries = self.entries.len();

        CacheStats {
            total_entries,
            fresh_entries,
            stale_entries: total_entries.saturating_sub(fresh_entries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(ttl_secs: u64) -> (TtlCache<String>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (TtlCache::new(Duration::from_secs(ttl_secs), clock.clone()), clock)
    }

    #[test]
    fn test_default_ttls() {
        let ttls = CacheTtls::default();
        assert_eq!(ttls.fishing, Duration::from_secs(86_400));
        assert_eq!(ttls.environmental, Duration::from_secs(3_600));
        assert_eq!(ttls.species, Duration::from_secs(86_400));
    }

    #[test]
    fn test_fresh_then_stale() {
        let (cache, clock) = cache(60);
        assert!(cache.get("mpa-1").is_none());

        cache.set("mpa-1", "summary".to_string());
        let hit = cache.get("mpa-1").unwrap();
        assert!(hit.fresh);
        assert_eq!(hit.value, "summary");

        clock.advance(Duration::from_secs(59));
        assert!(cache.get("mpa-1").unwrap().fresh);

        clock.advance(Duration::from_secs(1));
        let stale = cache.get("mpa-1").unwrap();
        assert!(!stale.fresh);
        assert_eq!(stale.age, Duration::from_secs(60));
        assert_eq!(cache.get_fresh("mpa-1"), None);
    }

    #[test]
    fn test_set_refreshes_timestamp() {
        let (cache, clock) = cache(10);
        cache.set("k", "v1".to_string());
        clock.advance(Duration::from_secs(20));
        cache.set("k", "v2".to_string());
        assert_eq!(cache.get_fresh("k"), Some("v2".to_string()));
    }

    #[test]
    fn test_invalidate_and_stats() {
        let (cache, clock) = cache(10);
        cache.set("a", "1".to_string());
        clock.advance(Duration::from_secs(11));
        cache.set("b", "2".to_string());

        let stats = cache.stats();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.fresh_entries, 1);
        assert_eq!(stats.stale_entries, 1);

        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
