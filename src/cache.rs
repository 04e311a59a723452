use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use crate::metrics::CACHE_SIZE;

// Cache entry with timestamp
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub value: Value,
    pub stored_at: Instant,
    pub ttl: Duration,
    // wall clock copy of stored_at, only for introspection
    pub stored_at_utc: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.stored_at + self.ttl
    }
}

// One row of the read-only cache snapshot
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CacheSnapshotEntry {
    pub key: String,
    pub value: Value,
    pub stored_at: DateTime<Utc>,
}

/// Time-bounded response cache.
///
/// Expiry is checked on read; there is no background eviction. Every
/// `invalidate` bumps a per-key generation so a read-through fill that started
/// before the invalidation cannot store its older body afterwards.
#[derive(Default)]
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    generations: DashMap<String, u64>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: &str, now: Instant) -> Option<Value> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired_at(now) {
                return Some(entry.value.clone());
            }
        }
        // Guard dropped above; drop the stale entry unless someone re-set it meanwhile
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired_at(now))
            .is_some()
        {
            CACHE_SIZE.set(self.entries.len() as f64);
        }
        None
    }

    pub fn set(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        self.set_at(key, value, ttl, Instant::now());
    }

    pub fn set_at(&self, key: impl Into<String>, value: Value, ttl: Duration, now: Instant) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                stored_at: now,
                ttl,
                stored_at_utc: Utc::now(),
            },
        );
        CACHE_SIZE.set(self.entries.len() as f64);
    }

    // Current invalidation generation of `key`, taken before a backend fetch
    pub fn generation(&self, key: &str) -> u64 {
        self.generations.get(key).map(|g| *g).unwrap_or(0)
    }

    /// Store `value` only if `key` has not been invalidated since `generation`
    /// was read. Returns whether the value was stored.
    pub fn set_if_unchanged(
        &self,
        key: &str,
        generation: u64,
        value: Value,
        ttl: Duration,
    ) -> bool {
        // generation lock held across the insert; invalidate takes it in the same order
        let current = self.generations.entry(key.to_string()).or_insert(0);
        if *current != generation {
            return false;
        }
        self.set(key, value, ttl);
        drop(current);
        true
    }

    pub fn invalidate(&self, key: &str) {
        let mut generation = self.generations.entry(key.to_string()).or_insert(0);
        *generation += 1;
        if self.entries.remove(key).is_some() {
            CACHE_SIZE.set(self.entries.len() as f64);
        }
        drop(generation);
    }

    pub fn list_all(&self) -> Vec<CacheSnapshotEntry> {
        self.list_all_at(Instant::now())
    }

    // Snapshot for diagnostics. Expired entries are hidden but not removed.
    pub fn list_all_at(&self, now: Instant) -> Vec<CacheSnapshotEntry> {
        let mut rows: Vec<CacheSnapshotEntry> = self
            .entries
            .iter()
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| CacheSnapshotEntry {
                key: entry.key().clone(),
                value: entry.value.clone(),
                stored_at: entry.stored_at_utc,
            })
            .collect();
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        rows
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Collection-level key, e.g. "chatData"
pub fn collection_key(service: &str) -> String {
    format!("{}Data", service)
}

// Per-id key, e.g. "chatData:42"
pub fn item_key(service: &str, id: &str) -> String {
    format!("{}Data:{}", service, id)
}
