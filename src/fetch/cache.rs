// src/fetch/cache.rs
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: Bytes,
    pub captured_at: Instant,
}

/// Short-lived response cache keyed by URL.
/// Entries are never evicted; a stale entry reads as absent and is
/// superseded by the next successful fetch.
#[derive(Debug)]
pub struct FetchCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    freshness: Duration,
}

impl FetchCache {
    pub fn new(freshness: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            freshness,
        }
    }

    pub fn get_fresh(&self, url: &str, now: Instant) -> Option<Bytes> {
        let map = self.entries.read().unwrap_or_else(|e| e.into_inner());
        map.get(url)
            .filter(|e| now.saturating_duration_since(e.captured_at) < self.freshness)
            .map(|e| e.data.clone())
    }

    pub fn insert(&self, url: &str, data: Bytes, now: Instant) {
        let mut map = self.entries.write().unwrap_or_else(|e| e.into_inner());
        map.insert(
            url.to_string(),
            CacheEntry {
                data,
                captured_at: now,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
