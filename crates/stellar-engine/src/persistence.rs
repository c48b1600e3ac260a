//! Debounced save scheduling and the key-value store it writes to.
//!
//! The scheduler only tracks *which* keys are due; the engine encodes each
//! document at write time, so a write always carries the latest state no
//! matter how many requests were coalesced into it.

use std::collections::BTreeMap;
use std::io;

use tracing::debug;

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// String key-value storage for save documents.
pub trait SaveStore: std::fmt::Debug {
    fn read(&self, key: &str) -> io::Result<Option<String>>;

    fn write(&mut self, key: &str, value: &str) -> io::Result<()>;

    fn remove(&mut self, key: &str) -> io::Result<()>;
}

/// In-memory store for tests and embedding hosts that persist elsewhere.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    writes: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Writes performed since creation.
    pub fn writes(&self) -> u64 {
        self.writes
    }
}

impl SaveStore for MemoryStore {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.writes += 1;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Coalesces save requests per key.
///
/// A pending key becomes due once `debounce_ms` has passed since its first
/// request *and* `min_interval_ms` has passed since its last write.
#[derive(Debug, Clone)]
pub struct SaveScheduler {
    debounce_ms: u64,
    min_interval_ms: u64,
    /// Key -> time of the first request since the last write.
    pending: BTreeMap<&'static str, u64>,
    last_write: BTreeMap<&'static str, u64>,
}

impl SaveScheduler {
    pub fn new(debounce_ms: u64, min_interval_ms: u64) -> Self {
        Self {
            debounce_ms,
            min_interval_ms,
            pending: BTreeMap::new(),
            last_write: BTreeMap::new(),
        }
    }

    /// Ask for `key` to be written. Repeated requests before the write are
    /// coalesced into the first.
    pub fn request(&mut self, key: &'static str, now_ms: u64) {
        self.pending.entry(key).or_insert(now_ms);
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn is_due(&self, key: &str, requested_at: u64, now_ms: u64) -> bool {
        let debounced = now_ms.saturating_sub(requested_at) >= self.debounce_ms;
        let spaced = self
            .last_write
            .get(key)
            .is_none_or(|&last| now_ms.saturating_sub(last) >= self.min_interval_ms);
        debounced && spaced
    }

    /// Keys due at `now_ms`, without taking them.
    pub fn due(&self, now_ms: u64) -> Vec<&'static str> {
        self.pending
            .iter()
            .filter(|&(key, &at)| self.is_due(key, at, now_ms))
            .map(|(key, _)| *key)
            .collect()
    }

    /// Take every due key and record it as written at `now_ms`.
    pub fn take_due(&mut self, now_ms: u64) -> Vec<&'static str> {
        let due = self.due(now_ms);
        for &key in &due {
            self.pending.remove(key);
            self.last_write.insert(key, now_ms);
        }
        if !due.is_empty() {
            debug!(keys = ?due, "Save keys due");
        }
        due
    }

    /// Take every pending key regardless of either window.
    pub fn flush(&mut self, now_ms: u64) -> Vec<&'static str> {
        let keys: Vec<&'static str> = std::mem::take(&mut self.pending).into_keys().collect();
        for &key in &keys {
            self.last_write.insert(key, now_ms);
        }
        keys
    }

    /// Put back a key whose write failed, keeping its original request time
    /// if it is already pending again.
    pub fn retry(&mut self, key: &'static str, requested_at: u64) {
        self.pending.entry(key).or_insert(requested_at);
        self.last_write.remove(key);
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.last_write.clear();
    }
}
