//! Performance-aware agent selection
//!
//! Routes a unit of work to the best-performing compatible agent and caches
//! the decision through the multi-level cache so identical requests skip the
//! scoring work entirely.
//!
//! Structure:
//! - types.rs: agent profiles, selection criteria and results
//! - registry.rs: `AgentRegistry` seam plus TOML-file and in-memory backends
//! - performance.rs: rolling per-agent metrics and the composite score
//! - selector.rs: the cached, gated selection flow

pub mod performance;
pub mod registry;
pub mod selector;
pub mod types;

pub use performance::{AgentMetrics, PerformanceTracker};
pub use registry::{AgentRegistry, InMemoryAgentRegistry, RegistryError, TomlAgentRegistry};
pub use selector::{AgentSelector, ScoringError, SelectionError};
pub use types::{AgentProfile, Complexity, SelectionCriteria, SelectionResult};
