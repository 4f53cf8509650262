//! In-memory response cache with per-entry absolute expiry.
//!
//! The fetcher stores every upstream response here so that concurrent
//! request handlers and the poll loop share one upstream call per TTL
//! window.  Eviction is lazy: a stale entry is dropped by the read that
//! discovers it, there is no background sweeper.
//!
//! One cache is built at startup and handed to every component as a
//! cloneable handle; it lives exactly as long as the process.

pub mod policy;

pub use policy::{live_cache_ttl, live_ttl};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Thread-safe key → value cache with per-entry TTL.
#[derive(Clone)]
pub struct TtlCache<V> {
    inner: Arc<Mutex<HashMap<String, CacheEntry<V>>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        TtlCache {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        // Inserts and removes are single calls; a poisoned map is still whole.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Store `value` under `key` until `ttl` from now, replacing any prior entry.
    pub fn set(&self, key: &str, value: V, ttl: Duration) {
        self.set_at(key, value, ttl, Instant::now());
    }

    pub fn set_at(&self, key: &str, value: V, ttl: Duration, now: Instant) {
        self.lock().insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: now + ttl,
            },
        );
    }

    /// Return the value for `key` if present and unexpired.
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Visible while `now <= expires_at`; an expired entry is evicted here.
    pub fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        let mut map = self.lock();
        let expired = match map.get(key) {
            None => return None,
            Some(entry) => now > entry.expires_at,
        };
        if expired {
            map.remove(key);
            return None;
        }
        map.get(key).map(|e| e.value.clone())
    }

    /// Number of stored entries, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.lock().len()
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
