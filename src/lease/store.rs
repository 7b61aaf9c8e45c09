//! Coordination Store
//!
//! The raw coordination store is an external collaborator. `CoordinationStore` captures
//! the three operations the lease protocol needs; `MemoryCoordinationStore` implements
//! them in-process for the manager and for tests.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::Duration;
use tokio::time::Instant;

#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Current value of `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Atomically stores `value` with a TTL if `key` is absent or expired.
    /// Returns whether the write happened.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Atomically resets the TTL of `key` if it is live and currently equals `value`.
    /// Returns whether the extension happened.
    async fn extend_if_equals(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;
}

#[derive(Debug, Clone)]
struct StoreEntry {
    value: String,
    expires_at: Instant,
}

impl StoreEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// TTL key-value store whose conditional writes hold the map's shard lock for the whole
/// compare-and-write, which makes them linearizable within the process.
#[derive(Default)]
pub struct MemoryCoordinationStore {
    entries: DashMap<String, StoreEntry>,
}

impl MemoryCoordinationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops expired entries. Purely housekeeping; reads already ignore them.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.is_live(now));
    }
}

#[async_trait]
impl CoordinationStore for MemoryCoordinationStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        Ok(self
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let fresh = StoreEntry {
            value: value.to_string(),
            expires_at: now + ttl,
        };

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    return Ok(false);
                }
                occupied.insert(fresh);
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                Ok(true)
            }
        }
    }

    async fn extend_if_equals(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();

        match self.entries.get_mut(key) {
            Some(mut entry) if entry.is_live(now) && entry.value == value => {
                entry.expires_at = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
