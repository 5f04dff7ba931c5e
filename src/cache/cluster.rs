//! Cross-worker cache replication.
//!
//! Each worker process in the group owns one `ClusterCache`, all of
//! them sharing a single `tokio::sync::broadcast::Sender<CacheOp>`.
//! A write applies to the local LRU immediately *and* is broadcast so
//! every sibling converges on the same key set — message passing over
//! a channel, not shared memory, so the design stays sound even if
//! workers are eventually split across processes instead of tasks.
//!
//! Every `CacheOp` is idempotent (re-applying `Set`/`RemoveKeys`/
//! `Clear` changes nothing), so a worker re-receiving its own
//! broadcast op via its subscriber loop is harmless rather than a bug
//! to route around.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::broadcast;

use super::config::CacheConfig;
use super::lru::{EntrySnapshot, LruCache};
use super::stats::{CacheStats, CacheStatsSnapshot};

#[derive(Debug, Clone)]
pub enum CacheOp {
    Set { key: String, value: Value, ttl_secs: u64 },
    RemoveKeys(Vec<String>),
    Clear,
}

pub struct ClusterCache {
    inner: Arc<Mutex<LruCache>>,
    stats: Arc<CacheStats>,
    tx: broadcast::Sender<CacheOp>,
    default_ttl: Duration,
}

impl ClusterCache {
    /// Join a cluster on `tx`, spawning the task that applies
    /// siblings' ops (and echoes of this worker's own) to the local
    /// LRU as they arrive.
    pub fn join(config: &CacheConfig, tx: broadcast::Sender<CacheOp>) -> Self {
        let inner = Arc::new(Mutex::new(LruCache::new(config.max_length, config.max_bytes)));
        let stats = Arc::new(CacheStats::default());

        let mut rx = tx.subscribe();
        let listener_inner = inner.clone();
        let listener_stats = stats.clone();
        tokio::spawn(async move {
            while let Ok(op) = rx.recv().await {
                apply(&listener_inner, &listener_stats, op);
            }
        });

        Self { inner, stats, tx, default_ttl: config.ttl }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let mut guard = self.inner.lock().expect("lru mutex poisoned");
        let hit = guard.get(key);
        drop(guard);
        if hit.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        hit
    }

    pub fn set(&self, key: String, value: Value) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    pub fn set_with_ttl(&self, key: String, value: Value, ttl: Duration) {
        let op = CacheOp::Set { key, value, ttl_secs: ttl.as_secs() };
        apply(&self.inner, &self.stats, op.clone());
        let _ = self.tx.send(op);
    }

    /// Remove exactly `keys` locally and across the cluster.
    pub fn remove_keys(&self, keys: Vec<String>) {
        if keys.is_empty() {
            return;
        }
        let op = CacheOp::RemoveKeys(keys);
        apply(&self.inner, &self.stats, op.clone());
        let _ = self.tx.send(op);
    }

    /// Remove every key matching `predicate` locally, then broadcast
    /// the concrete key list (not the predicate — closures don't cross
    /// the wire) so siblings remove exactly the same keys.
    pub fn invalidate_matching<F: Fn(&str) -> bool>(&self, predicate: F) -> Vec<String> {
        let victims = {
            let mut guard = self.inner.lock().expect("lru mutex poisoned");
            guard.remove_matching(predicate)
        };
        if !victims.is_empty() {
            self.stats.record_invalidations(victims.len() as u64);
            let _ = self.tx.send(CacheOp::RemoveKeys(victims.clone()));
        }
        victims
    }

    pub fn clear(&self) {
        apply(&self.inner, &self.stats, CacheOp::Clear);
        let _ = self.tx.send(CacheOp::Clear);
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    /// Snapshot of every key currently held locally, for the
    /// invalidation engine to scan.
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().expect("lru mutex poisoned").keys()
    }

    /// Per-entry bookkeeping, most-recently-used first, for
    /// `/api/cache/stats?details=true`.
    pub fn entries(&self) -> Vec<EntrySnapshot> {
        self.inner.lock().expect("lru mutex poisoned").entries()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("lru mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn apply(inner: &Arc<Mutex<LruCache>>, stats: &Arc<CacheStats>, op: CacheOp) {
    let mut guard = inner.lock().expect("lru mutex poisoned");
    match op {
        CacheOp::Set { key, value, ttl_secs } => {
            guard.put(key, value, Duration::from_secs(ttl_secs));
            stats.record_set();
        }
        CacheOp::RemoveKeys(keys) => {
            for key in keys {
                guard.remove(&key);
            }
        }
        CacheOp::Clear => guard.clear(),
    }
}
