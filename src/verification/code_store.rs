//! Storage for issued verification codes.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

use crate::error::Result;
use crate::ratelimit::{Clock, SystemClock};

/// Holds one pending code per key until it expires or is consumed.
#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Store `code` under `key`, replacing any previous code.
    async fn put(&self, key: &str, code: &str, ttl: Duration) -> Result<()>;

    /// The pending code for `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Forget the code for `key`.
    async fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
struct PendingCode {
    code: String,
    expires_at_ms: u64,
}

/// Code store held in process memory.
pub struct MemoryCodeStore {
    codes: DashMap<String, PendingCode>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for MemoryCodeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCodeStore")
            .field("pending", &self.codes.len())
            .finish_non_exhaustive()
    }
}

impl MemoryCodeStore {
    /// Create an empty store reading the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Create an empty store with an explicit clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            codes: DashMap::new(),
            clock,
        }
    }

    /// Drop every code that has expired by `now_ms`, returning how many went.
    pub fn purge_expired(&self, now_ms: u64) -> usize {
        let before = self.codes.len();
        self.codes.retain(|_, pending| pending.expires_at_ms > now_ms);
        let purged = before.saturating_sub(self.codes.len());

        if purged > 0 {
            debug!(purged = purged, "Purged expired verification codes");
        }
        purged
    }

    /// Number of codes currently held, expired or not.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether no codes are held.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl Default for MemoryCodeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CodeStore for MemoryCodeStore {
    async fn put(&self, key: &str, code: &str, ttl: Duration) -> Result<()> {
        let expires_at_ms = self.clock.now_ms().saturating_add(ttl.as_millis() as u64);
        self.codes.insert(
            key.to_string(),
            PendingCode {
                code: code.to_string(),
                expires_at_ms,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now_ms = self.clock.now_ms();
        // Expired codes are dropped on read
        let removed = self
            .codes
            .remove_if(key, |_, pending| pending.expires_at_ms <= now_ms);
        if removed.is_some() {
            return Ok(None);
        }
        Ok(self.codes.get(key).map(|pending| pending.code.clone()))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.codes.remove(key);
        Ok(())
    }
}

/// Code store in Redis, relying on `PX` expiry.
#[derive(Clone)]
pub struct RedisCodeStore {
    connection: ConnectionManager,
}

impl fmt::Debug for RedisCodeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCodeStore").finish_non_exhaustive()
    }
}

impl RedisCodeStore {
    /// Build a store over an existing connection manager.
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl CodeStore for RedisCodeStore {
    async fn put(&self, key: &str, code: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(code)
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        let code: Option<String> = conn.get(key).await?;
        Ok(code)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::MockClock;

    #[tokio::test]
    async fn test_memory_code_store_roundtrip() {
        let store = MemoryCodeStore::new();

        store.put("code:login:1", "123456", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("code:login:1").await.unwrap().as_deref(), Some("123456"));

        store.remove("code:login:1").await.unwrap();
        assert_eq!(store.get("code:login:1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_code_store_expiry() {
        let clock = MockClock::new(0);
        let store = MemoryCodeStore::with_clock(Arc::new(clock.clone()));

        store.put("code:login:1", "123456", Duration::from_secs(60)).await.unwrap();

        clock.set(59_999);
        assert!(store.get("code:login:1").await.unwrap().is_some());

        clock.set(60_000);
        assert!(store.get("code:login:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_code_store_replaces() {
        let store = MemoryCodeStore::new();

        store.put("k", "111111", Duration::from_secs(60)).await.unwrap();
        store.put("k", "222222", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("222222"));
    }

    #[tokio::test]
    async fn test_memory_code_store_purges_unread_codes() {
        let clock = MockClock::new(0);
        let store = MemoryCodeStore::with_clock(Arc::new(clock.clone()));

        for i in 0..1000 {
            let key = format!("code:login:{}", i);
            store.put(&key, "123456", Duration::from_secs(1)).await.unwrap();
        }
        store.put("code:login:late", "654321", Duration::from_secs(5)).await.unwrap();
        assert_eq!(store.len(), 1001);

        clock.set(999);
        assert_eq!(store.purge_expired(clock.now_ms()), 0);

        clock.set(1000);
        assert_eq!(store.purge_expired(clock.now_ms()), 1000);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("code:login:late").await.unwrap().as_deref(), Some("654321"));

        assert_eq!(store.purge_expired(5000), 1);
        assert!(store.is_empty());
    }
}
