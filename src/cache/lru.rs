//! An arena-backed LRU map.
//!
//! Nodes live in a `Vec<Option<Node>>`; the doubly-linked list that
//! tracks recency is expressed as indices into that arena rather than
//! raw pointers, so the whole structure stays `Send` and safe to move
//! across the broadcast channel boundary in [`super::cluster`]. Freed
//! slots are recycled via a free list instead of shrinking the vec.

use std::collections::HashMap;
use std::time::Duration;

use super::entry::CacheEntry;

/// One entry's bookkeeping, as reported by [`LruCache::entries`].
#[derive(Debug, Clone)]
pub struct EntrySnapshot {
    pub key: String,
    pub age: Duration,
    pub hits: u64,
    pub size_bytes: usize,
}

struct Node {
    key: String,
    entry: CacheEntry,
    prev: Option<usize>,
    next: Option<usize>,
}

/// A capacity- and byte-bounded LRU cache, keyed by string.
pub struct LruCache {
    nodes: Vec<Option<Node>>,
    index: HashMap<String, usize>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    max_len: usize,
    max_bytes: usize,
    bytes_used: usize,
}

impl LruCache {
    pub fn new(max_len: usize, max_bytes: usize) -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            max_len,
            max_bytes,
            bytes_used: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Snapshot of every key currently held, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.index.keys().cloned().collect()
    }

    /// Look up `key`, promoting it to most-recently-used on a hit.
    /// Expired entries are treated as absent and evicted on access.
    pub fn get(&mut self, key: &str) -> Option<serde_json::Value> {
        let idx = *self.index.get(key)?;
        if self.nodes[idx].as_ref().unwrap().entry.is_expired() {
            self.remove(key);
            return None;
        }
        self.detach(idx);
        self.attach_front(idx);
        let node = self.nodes[idx].as_mut().unwrap();
        node.entry.hits += 1;
        Some(node.entry.value.clone())
    }

    /// Snapshot of every live entry's bookkeeping, ordered
    /// most-recently-used first, for `/api/cache/stats?details=true`.
    pub fn entries(&self) -> Vec<EntrySnapshot> {
        let mut snapshots = Vec::with_capacity(self.index.len());
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            let node = self.nodes[idx].as_ref().unwrap();
            snapshots.push(EntrySnapshot {
                key: node.key.clone(),
                age: node.entry.age(),
                hits: node.entry.hits,
                size_bytes: node.entry.size_bytes,
            });
            cursor = node.next;
        }
        snapshots
    }

    /// Insert or replace `key`, evicting least-recently-used entries
    /// until both the length and byte budgets are satisfied.
    pub fn put(&mut self, key: String, value: serde_json::Value, ttl: Duration) {
        let entry = CacheEntry::new(value, ttl);

        if let Some(&idx) = self.index.get(&key) {
            let old_size = self.nodes[idx].as_ref().unwrap().entry.size_bytes;
            self.bytes_used -= old_size;
            self.bytes_used += entry.size_bytes;
            self.nodes[idx].as_mut().unwrap().entry = entry;
            self.detach(idx);
            self.attach_front(idx);
        } else {
            let idx = self.alloc(key.clone(), entry);
            self.bytes_used += self.nodes[idx].as_ref().unwrap().entry.size_bytes;
            self.index.insert(key, idx);
            self.attach_front(idx);
        }

        self.enforce_limits();
    }

    /// Remove `key` if present, returning whether it was found.
    pub fn remove(&mut self, key: &str) -> bool {
        let Some(idx) = self.index.remove(key) else {
            return false;
        };
        self.bytes_used -= self.nodes[idx].as_ref().unwrap().entry.size_bytes;
        self.detach(idx);
        self.nodes[idx] = None;
        self.free.push(idx);
        true
    }

    /// Remove every key for which `predicate` returns true. Returns the
    /// removed keys so callers can log or replicate them.
    pub fn remove_matching<F: Fn(&str) -> bool>(&mut self, predicate: F) -> Vec<String> {
        let victims: Vec<String> = self.index.keys().filter(|k| predicate(k)).cloned().collect();
        for key in &victims {
            self.remove(key);
        }
        victims
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.bytes_used = 0;
    }

    fn enforce_limits(&mut self) {
        while self.index.len() > self.max_len || self.bytes_used > self.max_bytes {
            let Some(tail) = self.tail else { break };
            let key = self.nodes[tail].as_ref().unwrap().key.clone();
            self.remove(&key);
        }
    }

    fn alloc(&mut self, key: String, entry: CacheEntry) -> usize {
        let node = Node { key, entry, prev: None, next: None };
        if let Some(idx) = self.free.pop() {
            self.nodes[idx] = Some(node);
            idx
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.nodes[idx].as_ref().unwrap();
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.nodes[p].as_mut().unwrap().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].as_mut().unwrap().prev = prev,
            None => self.tail = prev,
        }
        let node = self.nodes[idx].as_mut().unwrap();
        node.prev = None;
        node.next = None;
    }

    fn attach_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = self.nodes[idx].as_mut().unwrap();
            node.next = old_head;
            node.prev = None;
        }
        if let Some(h) = old_head {
            self.nodes[h].as_mut().unwrap().prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }
}
