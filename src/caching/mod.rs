//! Multi-level decision caching
//!
//! Two cooperating tiers sit behind one façade:
//!
//! - **L1**: bounded in-process cache with TTL and least-recently-accessed
//!   eviction, synchronous and lock-cheap.
//! - **L2**: client to an external distributed key/value store, lazily
//!   connected and failure-tolerant. A store outage degrades reads to misses
//!   and writes to no-ops; it never surfaces to callers.
//!
//! Structure:
//! - keys.rs: deterministic content-addressed cache key generation
//! - l1.rs: in-process tier
//! - l2.rs: `L2Store` seam, Redis-backed and in-memory implementations
//! - multi_level.rs: read-through/write-through orchestration and stats

pub mod keys;
pub mod l1;
pub mod l2;
pub mod multi_level;

pub use l1::L1Cache;
pub use l2::{InMemoryL2Store, L2Store, RedisL2Store};
pub use multi_level::MultiLevelCache;

use std::time::{Duration, Instant};

/// Running statistics for the multi-level cache.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub l1_hits: u64,
    pub l1_misses: u64,
    pub l2_hits: u64,
    pub l2_misses: u64,
    pub total_requests: u64,
    /// Exponential moving average of per-operation latency.
    pub avg_response_time_ms: f64,
    /// (l1_hits + l2_hits) / total_requests while total_requests > 0.
    pub hit_ratio: f64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_hit_ratio(&mut self) {
        if self.total_requests > 0 {
            self.hit_ratio = (self.l1_hits + self.l2_hits) as f64 / self.total_requests as f64;
        }
    }

    /// Fold one latency sample into the moving average. The first sample
    /// seeds the average directly.
    pub fn record_response_time(&mut self, sample_ms: f64, alpha: f64) {
        if self.avg_response_time_ms == 0.0 {
            self.avg_response_time_ms = sample_ms;
        } else {
            self.avg_response_time_ms =
                alpha * sample_ms + (1.0 - alpha) * self.avg_response_time_ms;
        }
    }
}

/// A cached value with its lifetime and access metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: Instant,
    pub expires_at: Instant,
    pub last_accessed: Instant,
    pub access_count: u64,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            value,
            created_at: now,
            expires_at: now + ttl,
            last_accessed: now,
            access_count: 0,
        }
    }

    pub fn touch(&mut self) {
        self.last_accessed = Instant::now();
        self.access_count += 1;
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_ratio_invariant() {
        let mut stats = CacheStats::new();
        stats.l1_hits = 3;
        stats.l2_hits = 1;
        stats.l1_misses = 2;
        stats.l2_misses = 1;
        stats.total_requests = 5;
        stats.update_hit_ratio();
        assert!((stats.hit_ratio - 4.0 / 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ema_seeds_then_smooths() {
        let mut stats = CacheStats::new();
        stats.record_response_time(10.0, 0.1);
        assert!((stats.avg_response_time_ms - 10.0).abs() < f64::EPSILON);
        stats.record_response_time(20.0, 0.1);
        assert!((stats.avg_response_time_ms - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_entry_expiry() {
        let entry = CacheEntry::new("v", Duration::from_secs(60));
        assert!(!entry.is_expired());
        let expired = CacheEntry::new("v", Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(expired.is_expired());
    }
}
