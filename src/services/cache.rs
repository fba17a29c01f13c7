use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use rocket_okapi::okapi::schemars::JsonSchema;

#[derive(Clone)]
struct CacheEntry {
    value: Value,
    created_at: Instant,
}

#[derive(Debug, Default, Clone, Serialize, JsonSchema)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
    pub entries: usize,
    pub hit_rate: f64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    stats: CacheStats,
}

/// Process-local TTL cache for rendered JSON responses. Entries expire
/// lazily on read; writes sweep expired entries and evict the oldest one
/// when the cache is full.
pub struct ResponseCache {
    ttl: Duration,
    max_entries: usize,
    state: Mutex<CacheState>,
}

impl ResponseCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // A panic while holding the lock leaves plain data behind; keep serving.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let mut state = self.lock();
        let fresh = match state.entries.get(key) {
            Some(entry) if entry.created_at.elapsed() <= self.ttl => Some(entry.value.clone()),
            Some(_) => {
                state.entries.remove(key);
                None
            }
            None => None,
        };
        match fresh {
            Some(value) => {
                state.stats.hits += 1;
                Some(value)
            }
            None => {
                state.stats.misses += 1;
                None
            }
        }
    }

    pub fn insert(&self, key: String, value: Value) {
        let ttl = self.ttl;
        let mut state = self.lock();
        state.entries.retain(|_, e| e.created_at.elapsed() <= ttl);

        if !state.entries.contains_key(&key) && state.entries.len() >= self.max_entries {
            let victim = state
                .entries
                .iter()
                .min_by_key(|(_, e)| e.created_at)
                .map(|(k, _)| k.clone());
            if let Some(victim) = victim {
                state.entries.remove(&victim);
                state.stats.evictions += 1;
            }
        }

        state.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: Instant::now(),
            },
        );
        state.stats.inserts += 1;
    }

    /// Drops every entry whose key starts with `prefix`. Returns how many.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|k, _| !k.starts_with(prefix));
        before - state.entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        let lookups = state.stats.hits + state.stats.misses;
        CacheStats {
            entries: state.entries.len(),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                state.stats.hits as f64 / lookups as f64
            },
            ..state.stats.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hit_and_miss_are_counted() {
        let cache = ResponseCache::new(Duration::from_secs(60), 10);
        assert!(cache.get("jobs:a").is_none());
        cache.insert("jobs:a".to_string(), json!({ "total": 1 }));
        assert_eq!(cache.get("jobs:a"), Some(json!({ "total": 1 })));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn expired_entries_are_dropped_on_read() {
        let cache = ResponseCache::new(Duration::ZERO, 10);
        cache.insert("jobs:a".to_string(), json!(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("jobs:a").is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn oldest_entry_is_evicted_when_full() {
        let cache = ResponseCache::new(Duration::from_secs(60), 2);
        cache.insert("jobs:a".to_string(), json!("a"));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("jobs:b".to_string(), json!("b"));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("jobs:c".to_string(), json!("c"));

        assert!(cache.get("jobs:a").is_none());
        assert!(cache.get("jobs:b").is_some());
        assert!(cache.get("jobs:c").is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn prefix_invalidation() {
        let cache = ResponseCache::new(Duration::from_secs(60), 10);
        cache.insert("jobs:browse:1".to_string(), json!(1));
        cache.insert("jobs:browse:2".to_string(), json!(2));
        cache.insert("stats".to_string(), json!(3));

        assert_eq!(cache.invalidate_prefix("jobs:"), 2);
        assert!(cache.get("stats").is_some());
    }
}
