//! L2 distributed cache tier
//!
//! The `L2Store` trait is the seam between the multi-level cache and
//! whatever distributed key/value store backs it. The production
//! implementation speaks Redis through a lazily created connection manager;
//! an in-memory implementation backs tests and single-process embeddings.
//!
//! Failure discipline: the distributed tier is best-effort. Every network or
//! store failure is logged at warn and reported as a miss or failed write.
//! Nothing here returns an error to callers.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Object-safe interface to the distributed tier. Values are opaque bytes;
/// serialization happens one layer up so any payload round-trips intact.
#[async_trait]
pub trait L2Store: Send + Sync + std::fmt::Debug {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> bool;
    async fn delete(&self, key: &str) -> bool;
    /// Delete every key matching a glob-style pattern, returning the count.
    async fn clear_pattern(&self, pattern: &str) -> u64;
}

/// Redis-backed L2 store.
///
/// The connection manager is created on first use; concurrent first users
/// race into a single initialization. A failed init leaves the cell empty so
/// the next operation retries the connection.
pub struct RedisL2Store {
    url: String,
    op_timeout: Duration,
    manager: OnceCell<redis::aio::ConnectionManager>,
}

impl std::fmt::Debug for RedisL2Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisL2Store")
            .field("url", &self.url)
            .field("op_timeout", &self.op_timeout)
            .field("connected", &self.manager.initialized())
            .finish()
    }
}

impl RedisL2Store {
    pub fn new(url: String, op_timeout: Duration) -> Self {
        Self {
            url,
            op_timeout,
            manager: OnceCell::new(),
        }
    }

    async fn connection(&self) -> Option<redis::aio::ConnectionManager> {
        let init = self.manager.get_or_try_init(|| async {
            let client = redis::Client::open(self.url.as_str())?;
            redis::aio::ConnectionManager::new(client).await
        });
        match tokio::time::timeout(self.op_timeout, init).await {
            Ok(Ok(manager)) => Some(manager.clone()),
            Ok(Err(e)) => {
                warn!(error = %e, "l2 store unreachable");
                None
            }
            Err(_) => {
                warn!(timeout = ?self.op_timeout, "l2 store connection timed out");
                None
            }
        }
    }
}

#[async_trait]
impl L2Store for RedisL2Store {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut conn = self.connection().await?;
        match tokio::time::timeout(self.op_timeout, conn.get::<_, Option<Vec<u8>>>(key)).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                warn!(key, error = %e, "l2 get failed, treating as miss");
                None
            }
            Err(_) => {
                warn!(key, "l2 get timed out, treating as miss");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> bool {
        let Some(mut conn) = self.connection().await else {
            return false;
        };
        let secs = ttl.as_secs().max(1);
        match tokio::time::timeout(self.op_timeout, conn.set_ex::<_, _, ()>(key, value, secs))
            .await
        {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(key, error = %e, "l2 set failed");
                false
            }
            Err(_) => {
                warn!(key, "l2 set timed out");
                false
            }
        }
    }

    async fn delete(&self, key: &str) -> bool {
        let Some(mut conn) = self.connection().await else {
            return false;
        };
        match tokio::time::timeout(self.op_timeout, conn.del::<_, u64>(key)).await {
            Ok(Ok(removed)) => removed > 0,
            Ok(Err(e)) => {
                warn!(key, error = %e, "l2 delete failed");
                false
            }
            Err(_) => {
                warn!(key, "l2 delete timed out");
                false
            }
        }
    }

    async fn clear_pattern(&self, pattern: &str) -> u64 {
        let Some(mut conn) = self.connection().await else {
            return 0;
        };
        // SCAN, never KEYS: pattern deletion must not block the store.
        let scan = async {
            let mut keys = Vec::new();
            let mut iter = conn.scan_match::<_, String>(pattern).await?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            Ok::<_, redis::RedisError>(keys)
        };
        let keys = match tokio::time::timeout(self.op_timeout, scan).await {
            Ok(Ok(keys)) => keys,
            Ok(Err(e)) => {
                warn!(pattern, error = %e, "l2 scan failed");
                return 0;
            }
            Err(_) => {
                warn!(pattern, "l2 scan timed out");
                return 0;
            }
        };
        if keys.is_empty() {
            return 0;
        }
        match tokio::time::timeout(self.op_timeout, conn.del::<_, u64>(keys)).await {
            Ok(Ok(removed)) => {
                debug!(pattern, removed, "l2 pattern clear");
                removed
            }
            Ok(Err(e)) => {
                warn!(pattern, error = %e, "l2 pattern delete failed");
                0
            }
            Err(_) => {
                warn!(pattern, "l2 pattern delete timed out");
                0
            }
        }
    }
}

/// In-memory `L2Store` with the same TTL and pattern semantics, used by
/// tests and single-process deployments that opt out of a remote store.
#[derive(Debug, Default)]
pub struct InMemoryL2Store {
    entries: RwLock<HashMap<String, (Vec<u8>, Instant)>>,
}

impl InMemoryL2Store {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl L2Store for InMemoryL2Store {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let expired = {
            let entries = self.entries.read().unwrap();
            match entries.get(key) {
                Some((_, expires_at)) => Instant::now() > *expires_at,
                None => return None,
            }
        };
        if expired {
            self.entries.write().unwrap().remove(key);
            return None;
        }
        let entries = self.entries.read().unwrap();
        entries.get(key).map(|(bytes, _)| bytes.clone())
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> bool {
        let expires_at = Instant::now() + ttl;
        self.entries
            .write()
            .unwrap()
            .insert(key.to_string(), (value, expires_at));
        true
    }

    async fn delete(&self, key: &str) -> bool {
        self.entries.write().unwrap().remove(key).is_some()
    }

    async fn clear_pattern(&self, pattern: &str) -> u64 {
        let prefix = pattern.strip_suffix('*').unwrap_or(pattern);
        let mut entries = self.entries.write().unwrap();
        let doomed: Vec<String> = entries
            .keys()
            .filter(|k| {
                if pattern.ends_with('*') {
                    k.starts_with(prefix)
                } else {
                    k.as_str() == pattern
                }
            })
            .cloned()
            .collect();
        for key in &doomed {
            entries.remove(key);
        }
        doomed.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let store = InMemoryL2Store::new();
        assert!(store.set("k", b"payload".to_vec(), Duration::from_secs(60)).await);
        assert_eq!(store.get("k").await, Some(b"payload".to_vec()));
        assert!(store.delete("k").await);
        assert_eq!(store.get("k").await, None);
    }

    #[tokio::test]
    async fn test_in_memory_ttl() {
        let store = InMemoryL2Store::new();
        store.set("k", vec![1, 2, 3], Duration::from_millis(0)).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(store.get("k").await, None);
    }

    #[tokio::test]
    async fn test_in_memory_pattern_clear() {
        let store = InMemoryL2Store::new();
        store.set("sel::a", vec![1], Duration::from_secs(60)).await;
        store.set("sel::b", vec![2], Duration::from_secs(60)).await;
        store.set("other::c", vec![3], Duration::from_secs(60)).await;
        assert_eq!(store.clear_pattern("sel::*").await, 2);
        assert_eq!(store.get("sel::a").await, None);
        assert!(store.get("other::c").await.is_some());
    }

    #[tokio::test]
    async fn test_redis_store_degrades_when_unreachable() {
        // Nothing listens on this port; every operation must degrade, never error.
        let store = RedisL2Store::new(
            "redis://127.0.0.1:1/".to_string(),
            Duration::from_millis(200),
        );
        assert_eq!(store.get("k").await, None);
        assert!(!store.set("k", vec![1], Duration::from_secs(1)).await);
        assert!(!store.delete("k").await);
        assert_eq!(store.clear_pattern("k*").await, 0);
    }
}
