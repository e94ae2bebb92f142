//! Multi-level cache orchestration
//!
//! Read path: L1, then L2 with promotion back into L1 so the next read of
//! the same key takes the fast path. Write path: write-through to both
//! tiers. L1 is authoritative for freshness within its own TTL; L2 is
//! best-effort durability and cross-process sharing, so an L2-only failure
//! is logged and never undoes the L1 write.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::l1::L1Cache;
use super::l2::L2Store;
use super::CacheStats;

#[derive(Debug)]
pub struct MultiLevelCache<V> {
    l1: L1Cache<V>,
    l2: Option<std::sync::Arc<dyn L2Store>>,
    stats: RwLock<CacheStats>,
    ema_alpha: f64,
    default_l2_ttl: Duration,
}

impl<V> MultiLevelCache<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(
        l1: L1Cache<V>,
        l2: Option<std::sync::Arc<dyn L2Store>>,
        ema_alpha: f64,
        default_l2_ttl: Duration,
    ) -> Self {
        Self {
            l1,
            l2,
            stats: RwLock::new(CacheStats::new()),
            ema_alpha,
            default_l2_ttl,
        }
    }

    /// Read through both tiers. An L2 hit is promoted into L1 (default L1
    /// TTL) before returning, so it is immediately visible on the fast path.
    pub async fn get(&self, key: &str) -> Option<V> {
        let started = Instant::now();
        if let Some(value) = self.l1.get(key) {
            self.record_get(true, false, started);
            debug!(key, tier = "l1", "cache hit");
            return Some(value);
        }
        if let Some(l2) = &self.l2 {
            if let Some(bytes) = l2.get(key).await {
                match bincode::deserialize::<V>(&bytes) {
                    Ok(value) => {
                        self.l1.set(key, value.clone(), None);
                        self.record_get(false, true, started);
                        debug!(key, tier = "l2", "cache hit, promoted to l1");
                        return Some(value);
                    }
                    Err(e) => {
                        // A corrupt payload is a miss; drop it from L2 so it
                        // cannot poison later reads.
                        warn!(key, error = %e, "undecodable l2 payload, discarding");
                        l2.delete(key).await;
                    }
                }
            }
        }
        self.record_get(false, false, started);
        debug!(key, "cache miss");
        None
    }

    /// Write through both tiers. Returns true only when both writes
    /// succeeded; an L2 failure alone leaves the L1 write in place.
    pub async fn set(&self, key: &str, value: V, l1_ttl: Option<Duration>, l2_ttl: Duration) -> bool {
        let started = Instant::now();
        self.l1.set(key, value.clone(), l1_ttl);
        let mut ok = true;
        if let Some(l2) = &self.l2 {
            match bincode::serialize(&value) {
                Ok(bytes) => {
                    if !l2.set(key, bytes, l2_ttl).await {
                        warn!(key, "l2 write failed, l1 remains authoritative");
                        ok = false;
                    }
                }
                Err(e) => {
                    warn!(key, error = %e, "payload serialization failed, l2 skipped");
                    ok = false;
                }
            }
        }
        self.record_write(started);
        ok
    }

    /// Remove a key from both tiers.
    pub async fn delete(&self, key: &str) -> bool {
        let l1_removed = self.l1.delete(key);
        let l2_removed = match &self.l2 {
            Some(l2) => l2.delete(key).await,
            None => false,
        };
        l1_removed || l2_removed
    }

    /// Concurrently pre-populate both tiers, typically once at process
    /// start. Individual failures never abort the batch; the counts of
    /// succeeded and failed writes are returned.
    pub async fn warm(&self, entries: HashMap<String, V>) -> (usize, usize) {
        let writes = entries
            .into_iter()
            .map(|(key, value)| async move { self.set(&key, value, None, self.default_l2_ttl).await });
        let results = futures::future::join_all(writes).await;
        let succeeded = results.iter().filter(|ok| **ok).count();
        let failed = results.len() - succeeded;
        if failed > 0 {
            warn!(succeeded, failed, "cache warm-up completed with failures");
        } else {
            debug!(succeeded, "cache warm-up complete");
        }
        (succeeded, failed)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.read().unwrap().clone()
    }

    pub fn l1_size(&self) -> usize {
        self.l1.size()
    }

    pub fn default_l2_ttl(&self) -> Duration {
        self.default_l2_ttl
    }

    fn record_get(&self, l1_hit: bool, l2_hit: bool, started: Instant) {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let mut stats = self.stats.write().unwrap();
        stats.total_requests += 1;
        if l1_hit {
            stats.l1_hits += 1;
        } else {
            stats.l1_misses += 1;
            if l2_hit {
                stats.l2_hits += 1;
            } else {
                stats.l2_misses += 1;
            }
        }
        stats.record_response_time(elapsed_ms, self.ema_alpha);
        stats.update_hit_ratio();
    }

    fn record_write(&self, started: Instant) {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let mut stats = self.stats.write().unwrap();
        stats.record_response_time(elapsed_ms, self.ema_alpha);
    }
}
