// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! First-write-wins pending queues, one pair per chain.
//!
//! A queue maps contract addresses to timestamped entries. Insertion is
//! a no-op when the key is already present, so an address that is being
//! retried keeps its original timestamp — that is the mechanism that
//! bounds per-address retries to the retention window.

use ethers::types::Address;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug, Clone)]
struct QueueEntry<V> {
    value: V,
    inserted_at_ms: u64,
}

/// In-memory queue keyed by contract address.
///
/// Mutated only by the owning chain's tick task, so the lock is
/// uncontended in steady state.
pub struct PendingQueue<V> {
    chain: String,
    stage: &'static str,
    entries: RwLock<HashMap<Address, QueueEntry<V>>>,
}

impl<V> PendingQueue<V> {
    pub fn new(chain: &str, stage: &'static str) -> Self {
        Self {
            chain: chain.to_string(),
            stage,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    /// Insert an entry unless the key is already present. Returns whether
    /// the entry was inserted. The timestamp is stamped with the current
    /// wall clock in milliseconds.
    pub async fn add(&self, key: Address, value: V) -> bool {
        self.add_at(key, value, now_ms()).await
    }

    pub(crate) async fn add_at(&self, key: Address, value: V, inserted_at_ms: u64) -> bool {
        let mut entries = self.entries.write().await;
        match entries.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(QueueEntry {
                    value,
                    inserted_at_ms,
                });
                true
            }
        }
    }

    /// Remove every entry whose age exceeds `max_age`. Returns the number
    /// of evicted entries.
    pub async fn evict_older_than(&self, max_age: Duration) -> usize {
        let now = now_ms();
        let max_age_ms = max_age.as_millis() as u64;
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.inserted_at_ms + max_age_ms >= now);
        before - entries.len()
    }

    pub async fn remove(&self, key: &Address) -> Option<V> {
        self.entries.write().await.remove(key).map(|e| e.value)
    }

    /// Apply `f` to the entry's value in place, preserving its timestamp.
    /// Returns `None` when the key is absent.
    pub async fn mutate<R>(&self, key: &Address, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        let mut entries = self.entries.write().await;
        entries.get_mut(key).map(|entry| f(&mut entry.value))
    }

    pub async fn contains(&self, key: &Address) -> bool {
        self.entries.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl<V: Clone> PendingQueue<V> {
    /// Cloned view of the current entries. The tick iterates over the
    /// snapshot while mutating the queue through the methods above.
    pub async fn snapshot(&self) -> Vec<(Address, V)> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(key, entry)| (*key, entry.value.clone()))
            .collect()
    }

    #[cfg(test)]
    pub(crate) async fn inserted_at(&self, key: &Address) -> Option<u64> {
        self.entries
            .read()
            .await
            .get(key)
            .map(|entry| entry.inserted_at_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[tokio::test]
    async fn test_add_first_write_wins() {
        let queue = PendingQueue::new("mainnet", "metadata");
        assert!(queue.add(addr(1), "first").await);
        assert!(!queue.add(addr(1), "second").await);

        let snapshot = queue.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].1, "first");
    }

    #[tokio::test]
    async fn test_re_add_preserves_timestamp() {
        let queue = PendingQueue::new("mainnet", "metadata");
        queue.add_at(addr(1), "v", 1_000).await;
        queue.add(addr(1), "v").await;
        assert_eq!(queue.inserted_at(&addr(1)).await, Some(1_000));
    }

    #[tokio::test]
    async fn test_evict_older_than() {
        let queue = PendingQueue::new("mainnet", "metadata");
        let now = now_ms();
        queue.add_at(addr(1), "stale", now - 3_601_000).await;
        queue.add_at(addr(2), "fresh", now).await;

        let evicted = queue.evict_older_than(Duration::from_secs(3600)).await;
        assert_eq!(evicted, 1);
        assert!(!queue.contains(&addr(1)).await);
        assert!(queue.contains(&addr(2)).await);
    }

    #[tokio::test]
    async fn test_evict_boundary_is_exclusive() {
        let queue = PendingQueue::new("mainnet", "metadata");
        let now = now_ms();
        // Exactly at the window edge: timestamp + max_age == now stays
        queue.add_at(addr(1), "edge", now - 3_600_000).await;
        let evicted = queue.evict_older_than(Duration::from_secs(3600)).await;
        assert_eq!(evicted, 0);
    }

    #[tokio::test]
    async fn test_remove_and_mutate() {
        let queue = PendingQueue::new("mainnet", "source");
        queue.add(addr(1), vec!["a", "b"]).await;

        let remaining = queue
            .mutate(&addr(1), |pending| {
                pending.retain(|key| *key != "a");
                pending.len()
            })
            .await;
        assert_eq!(remaining, Some(1));
        assert_eq!(queue.inserted_at(&addr(1)).await.is_some(), true);

        assert_eq!(queue.remove(&addr(1)).await, Some(vec!["b"]));
        assert!(queue.is_empty().await);
        assert_eq!(queue.mutate(&addr(1), |p| p.len()).await, None);
    }
}
