//! Router composition root
//!
//! One explicit context object wires the cache, tracker and selector
//! together at process start. Components receive their collaborators by
//! injection; nothing reaches through global state.

use std::sync::Arc;

use tracing::info;

use crate::caching::{L1Cache, L2Store, MultiLevelCache, RedisL2Store};
use crate::config::RouterConfig;
use crate::selection::{
    AgentRegistry, AgentSelector, PerformanceTracker, RegistryError, SelectionResult,
};

/// Fully wired routing core. Constructed once at startup; cheap to share
/// through the contained `Arc`s.
#[derive(Debug)]
pub struct RouterContext {
    pub config: RouterConfig,
    pub cache: Arc<MultiLevelCache<SelectionResult>>,
    pub tracker: Arc<PerformanceTracker>,
    pub selector: Arc<AgentSelector>,
}

impl RouterContext {
    /// Wire the context from configuration. An L2 URL in the config turns
    /// on the Redis-backed distributed tier; otherwise the cache runs on L1
    /// alone. An empty or invalid registry fails startup here.
    pub fn initialize(
        config: RouterConfig,
        registry: Arc<dyn AgentRegistry>,
    ) -> Result<Self, RegistryError> {
        let l2 = config.cache.l2_url.as_ref().map(|url| {
            Arc::new(RedisL2Store::new(url.clone(), config.cache.l2_op_timeout()))
                as Arc<dyn L2Store>
        });
        Self::with_l2(config, registry, l2)
    }

    /// Wire the context with an explicit L2 store (or none). Used directly
    /// by tests and embeddings that bring their own store.
    pub fn with_l2(
        config: RouterConfig,
        registry: Arc<dyn AgentRegistry>,
        l2: Option<Arc<dyn L2Store>>,
    ) -> Result<Self, RegistryError> {
        let l2_enabled = l2.is_some();
        let l1 = L1Cache::new(config.cache.l1_max_size, config.cache.l1_default_ttl());
        let cache = Arc::new(MultiLevelCache::new(
            l1,
            l2,
            config.cache.ema_alpha,
            config.cache.l2_default_ttl(),
        ));
        let tracker = Arc::new(PerformanceTracker::new(config.tracker.clone()));
        let selector = Arc::new(AgentSelector::new(
            registry,
            Arc::clone(&cache),
            Arc::clone(&tracker),
            config.selector.clone(),
        )?);
        info!(
            l1_max_size = config.cache.l1_max_size,
            l2_enabled,
            gate_capacity = config.selector.gate_capacity,
            "router context initialized"
        );
        Ok(Self {
            config,
            cache,
            tracker,
            selector,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::{AgentProfile, InMemoryAgentRegistry, SelectionCriteria};

    #[tokio::test]
    async fn test_initialize_and_select() {
        let registry = Arc::new(InMemoryAgentRegistry::new(vec![AgentProfile::new(
            "a1", "Agent One", "general",
        )]));
        let ctx = RouterContext::initialize(RouterConfig::default(), registry).unwrap();
        let result = ctx
            .selector
            .select_agent(&SelectionCriteria::new("general_task"))
            .await
            .unwrap();
        assert_eq!(result.selected_agent.id, "a1");
    }
}
