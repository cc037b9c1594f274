//! # Cache
//!
//! In-memory cache of opaque payloads with monotonic expiry, plus a janitor
//! that evicts expired entries on a fixed interval (spec.md §4.6).

use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

use crate::cluster::Message;

#[derive(Debug, Clone)]
struct Entry {
    data: Message,
    expires_at: Instant,
}

/// Thread-safe cache keyed by generated identifier. Each operation takes
/// its own per-shard lock (via `DashMap`); the janitor uses the same
/// locking path as ordinary reads/writes.
#[derive(Debug, Default)]
pub struct Cache {
    entries: DashMap<Uuid, Entry>,
}

impl Cache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Inserts a new entry and returns its generated identifier.
    #[must_use]
    pub fn save(&self, data: Message, expires_in: Duration) -> Uuid {
        let id = Uuid::now_v7();
        self.entries.insert(
            id,
            Entry {
                data,
                expires_at: Instant::now() + expires_in,
            },
        );
        id
    }

    /// Overwrites an existing entry's payload and expiry, or inserts it if
    /// absent. Returns `true` if an existing entry was swapped.
    pub fn swap(&self, id: Uuid, data: Message, expires_in: Duration) -> bool {
        let existed = self.entries.contains_key(&id);
        self.entries.insert(
            id,
            Entry {
                data,
                expires_at: Instant::now() + expires_in,
            },
        );
        existed
    }

    /// Fetches an entry's payload if present and not expired.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<Message> {
        let entry = self.entries.get(&id)?;
        if entry.expires_at <= Instant::now() {
            None
        } else {
            Some(entry.data.clone())
        }
    }

    /// Removes every entry whose expiry has passed. Returns the count
    /// evicted.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<Uuid> = self
            .entries
            .iter()
            .filter(|kv| kv.value().expires_at <= now)
            .map(|kv| *kv.key())
            .collect();
        for id in &expired {
            self.entries.remove(id);
        }
        expired.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_get_round_trips() {
        let cache = Cache::new();
        let id = cache.save(serde_json::json!({"v": 1}), Duration::from_secs(60));
        assert_eq!(cache.get(id), Some(serde_json::json!({"v": 1})));
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let cache = Cache::new();
        let id = cache.save(serde_json::json!("gone"), Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get(id), None);
    }

    #[test]
    fn janitor_evicts_only_expired_entries() {
        let cache = Cache::new();
        let live = cache.save(serde_json::json!("live"), Duration::from_secs(60));
        let dead = cache.save(serde_json::json!("dead"), Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(20));

        let evicted = cache.evict_expired();
        assert_eq!(evicted, 1);
        assert!(cache.get(live).is_some());
        assert!(cache.get(dead).is_none());
    }

    #[test]
    fn swap_reports_whether_an_entry_existed() {
        let cache = Cache::new();
        let id = Uuid::now_v7();
        assert!(!cache.swap(id, serde_json::json!(1), Duration::from_secs(1)));
        assert!(cache.swap(id, serde_json::json!(2), Duration::from_secs(1)));
        assert_eq!(cache.get(id), Some(serde_json::json!(2)));
    }
}
