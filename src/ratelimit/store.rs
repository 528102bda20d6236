//! Window store contract and the in-process implementation.

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::window::{WindowOp, WindowRecord};
use crate::error::Result;

/// A shared store that runs window checks atomically per key.
///
/// Implementations must guarantee that a call to [`WindowStore::execute`]
/// never interleaves with another operation on the same key, and that a key
/// left alone for its interval expires. Retrying on failure is the caller's
/// decision; stores never retry.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Run one window check against `key`, returning whether it admitted.
    async fn execute(&self, key: &str, op: &WindowOp) -> Result<bool>;
}

/// Window store held in process memory.
///
/// Each key lives in its own `DashMap` entry; holding the entry guard for the
/// whole check gives the per-key atomicity the contract asks for. Only useful
/// when every caller shares the same process.
#[derive(Debug, Default)]
pub struct MemoryWindowStore {
    records: DashMap<String, WindowRecord>,
}

impl MemoryWindowStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every record whose expiry has passed at `now_ms`.
    pub fn purge_expired(&self, now_ms: u64) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired(now_ms));
        let purged = before.saturating_sub(self.records.len());

        if purged > 0 {
            debug!(purged = purged, "Purged expired window records");
        }
        purged
    }

    /// Number of keys currently held, expired or not.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of timestamps held for `key`, if it has a record.
    pub fn record_len(&self, key: &str) -> Option<usize> {
        self.records.get(key).map(|record| record.len())
    }
}

#[async_trait]
impl WindowStore for MemoryWindowStore {
    async fn execute(&self, key: &str, op: &WindowOp) -> Result<bool> {
        let mut record = self.records.entry(key.to_string()).or_default();
        Ok(record.apply(op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_memory_store_creates_records_lazily() {
        let store = MemoryWindowStore::new();
        assert!(store.is_empty());

        store.execute("ip:a", &WindowOp::new(1000, 5, 0)).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.record_len("ip:a"), Some(1));
        assert_eq!(store.record_len("ip:b"), None);
    }

    #[tokio::test]
    async fn test_memory_store_purges_expired() {
        let store = MemoryWindowStore::new();

        store.execute("ip:a", &WindowOp::new(1000, 5, 0)).await.unwrap();
        store.execute("ip:b", &WindowOp::new(1000, 5, 600)).await.unwrap();

        assert_eq!(store.purge_expired(1200), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.record_len("ip:b"), Some(1));

        assert_eq!(store.purge_expired(1600), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_keys_are_independent() {
        let store = MemoryWindowStore::new();

        assert!(store.execute("a:x", &WindowOp::new(1000, 1, 0)).await.unwrap());
        assert!(!store.execute("a:x", &WindowOp::new(1000, 1, 1)).await.unwrap());
        assert!(store.execute("b:x", &WindowOp::new(1000, 1, 1)).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_memory_store_concurrent_checks() {
        let store = Arc::new(MemoryWindowStore::new());

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .execute("ip:hot", &WindowOp::new(60_000, 10, 1_000))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let admitted = futures::future::join_all(handles)
            .await
            .into_iter()
            .filter(|r| *r.as_ref().unwrap())
            .count();

        assert_eq!(admitted, 10);
        assert_eq!(store.record_len("ip:hot"), Some(10));
    }
}
