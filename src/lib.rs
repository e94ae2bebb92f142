// Task Router Library
// Routes incoming work to the best-performing available agent and avoids
// redundant recomputation through a two-tier (in-process + distributed)
// decision cache.
pub mod caching;
pub mod config;
pub mod context;
pub mod selection;

// Re-export the key components so embedders work against one flat surface.
pub use caching::{
    CacheStats, InMemoryL2Store, L1Cache, L2Store, MultiLevelCache, RedisL2Store,
};
pub use config::{CacheSettings, ConfigError, RouterConfig, SelectorSettings, TrackerSettings};
pub use context::RouterContext;
pub use selection::{
    AgentMetrics, AgentProfile, AgentRegistry, AgentSelector, Complexity, InMemoryAgentRegistry,
    PerformanceTracker, RegistryError, ScoringError, SelectionCriteria, SelectionError,
    SelectionResult, TomlAgentRegistry,
};
