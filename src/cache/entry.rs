//! A single cached value plus the bookkeeping needed for expiry and
//! byte-budget accounting.

use std::time::{Duration, Instant};

use serde_json::Value;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    inserted_at: Instant,
    ttl: Duration,
    /// Serialized length in bytes, computed once at insert time and
    /// charged against the cache's byte budget.
    pub size_bytes: usize,
    /// Number of `get` calls that returned this entry, not counting
    /// the insert itself.
    pub hits: u64,
}

impl CacheEntry {
    pub fn new(value: Value, ttl: Duration) -> Self {
        let size_bytes = serde_json::to_vec(&value).map(|v| v.len()).unwrap_or(0);
        Self { value, inserted_at: Instant::now(), ttl, size_bytes, hits: 0 }
    }

    pub fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }

    pub fn age(&self) -> Duration {
        self.inserted_at.elapsed()
    }
}
