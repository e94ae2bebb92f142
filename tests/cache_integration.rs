use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use task_router::{
    AgentProfile, InMemoryL2Store, L1Cache, L2Store, MultiLevelCache, SelectionResult,
};

fn string_cache(l2: Option<Arc<dyn L2Store>>) -> MultiLevelCache<String> {
    MultiLevelCache::new(
        L1Cache::new(1000, Duration::from_secs(60)),
        l2,
        0.1,
        Duration::from_secs(3600),
    )
}

#[tokio::test]
async fn test_set_then_get_round_trip() {
    let cache = string_cache(Some(Arc::new(InMemoryL2Store::new())));
    assert!(
        cache
            .set("k", "v".to_string(), Some(Duration::from_secs(60)), Duration::from_secs(60))
            .await
    );
    assert_eq!(cache.get("k").await, Some("v".to_string()));
}

#[tokio::test]
async fn test_expired_entry_is_a_miss() {
    let cache = string_cache(None);
    cache
        .set(
            "k",
            "v".to_string(),
            Some(Duration::from_millis(10)),
            Duration::from_secs(60),
        )
        .await;
    tokio::time::sleep(Duration::from_millis(25)).await;
    assert_eq!(cache.get("k").await, None);
}

#[tokio::test]
async fn test_l1_eviction_bound_end_to_end() {
    let cache = string_cache(None);
    for i in 0..1001 {
        cache
            .set(
                &format!("key-{}", i),
                i.to_string(),
                None,
                Duration::from_secs(60),
            )
            .await;
    }
    assert_eq!(cache.l1_size(), 1000);
    // The least-recently-accessed original key is gone; the newest remains.
    assert_eq!(cache.get("key-0").await, None);
    assert_eq!(cache.get("key-1000").await, Some("1000".to_string()));
}

#[tokio::test]
async fn test_l2_shares_values_across_cache_instances() {
    // Two caches over one store model two processes sharing an L2.
    let l2: Arc<InMemoryL2Store> = Arc::new(InMemoryL2Store::new());
    let writer = string_cache(Some(l2.clone() as Arc<dyn L2Store>));
    let reader = string_cache(Some(l2 as Arc<dyn L2Store>));

    writer
        .set("shared", "payload".to_string(), None, Duration::from_secs(60))
        .await;
    assert_eq!(reader.get("shared").await, Some("payload".to_string()));

    let stats = reader.stats();
    assert_eq!(stats.l2_hits, 1);
    // Promotion: the same reader now hits L1.
    reader.get("shared").await;
    assert_eq!(reader.stats().l1_hits, 1);
}

#[tokio::test]
async fn test_selection_results_round_trip_through_l2() {
    let l2: Arc<InMemoryL2Store> = Arc::new(InMemoryL2Store::new());
    let writer: MultiLevelCache<SelectionResult> = MultiLevelCache::new(
        L1Cache::new(10, Duration::from_secs(60)),
        Some(l2.clone() as Arc<dyn L2Store>),
        0.1,
        Duration::from_secs(3600),
    );
    let reader: MultiLevelCache<SelectionResult> = MultiLevelCache::new(
        L1Cache::new(10, Duration::from_secs(60)),
        Some(l2 as Arc<dyn L2Store>),
        0.1,
        Duration::from_secs(3600),
    );

    let result = SelectionResult {
        selected_agent: AgentProfile::new("a1", "Agent One", "frontend")
            .with_capability("react"),
        confidence: 0.83,
        reasoning: "specialization 'frontend' matches the task".to_string(),
        alternatives: vec![AgentProfile::new("a2", "Agent Two", "general")],
        selection_time_ms: 4.2,
        cache_hit: false,
    };
    writer
        .set("decision", result.clone(), None, Duration::from_secs(60))
        .await;

    let read_back = reader.get("decision").await.unwrap();
    assert_eq!(read_back, result);
}

#[tokio::test]
async fn test_warm_up_counts_and_visibility() {
    let cache = string_cache(Some(Arc::new(InMemoryL2Store::new())));
    let mut entries = HashMap::new();
    for i in 0..25 {
        entries.insert(format!("hot-{}", i), format!("v{}", i));
    }
    let (succeeded, failed) = cache.warm(entries).await;
    assert_eq!((succeeded, failed), (25, 0));
    for i in 0..25 {
        assert!(cache.get(&format!("hot-{}", i)).await.is_some());
    }
    let stats = cache.stats();
    assert_eq!(stats.l1_hits, 25);
    assert!((stats.hit_ratio - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_stats_counters_and_ratio() {
    let cache = string_cache(Some(Arc::new(InMemoryL2Store::new())));
    cache
        .set("k", "v".to_string(), None, Duration::from_secs(60))
        .await;
    cache.get("k").await;
    cache.get("k").await;
    cache.get("missing-1").await;
    cache.get("missing-2").await;

    let stats = cache.stats();
    assert_eq!(stats.total_requests, 4);
    assert_eq!(stats.l1_hits, 2);
    assert_eq!(stats.l2_misses, 2);
    assert!((stats.hit_ratio - 0.5).abs() < 1e-9);
    assert!(stats.avg_response_time_ms >= 0.0);
}
