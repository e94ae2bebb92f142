//! Runtime configuration types
//!
//! Every tunable of the router lives here: cache geometry and TTLs, the
//! selection gate, confidence constants, and the performance score weights.
//! Defaults match the documented operating points; deployments override them
//! from a TOML file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration for a router context.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RouterConfig {
    /// Multi-level cache settings.
    pub cache: CacheSettings,
    /// Agent selection settings.
    pub selector: SelectorSettings,
    /// Performance tracking settings.
    pub tracker: TrackerSettings,
}

/// Settings for the L1/L2 cache pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheSettings {
    /// Maximum number of entries held by the in-process tier.
    pub l1_max_size: usize,
    /// Default L1 time-to-live in seconds.
    pub l1_default_ttl_secs: u64,
    /// Connection URL of the distributed tier; absent disables L2.
    pub l2_url: Option<String>,
    /// Per-operation timeout against the distributed tier, in seconds.
    pub l2_op_timeout_secs: u64,
    /// Default L2 time-to-live in seconds.
    pub l2_default_ttl_secs: u64,
    /// Smoothing factor for the response-time moving average.
    pub ema_alpha: f64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            l1_max_size: 1000,
            l1_default_ttl_secs: 300,
            l2_url: None,
            l2_op_timeout_secs: 5,
            l2_default_ttl_secs: 3600,
            ema_alpha: 0.1,
        }
    }
}

impl CacheSettings {
    pub fn l1_default_ttl(&self) -> Duration {
        Duration::from_secs(self.l1_default_ttl_secs)
    }

    pub fn l2_op_timeout(&self) -> Duration {
        Duration::from_secs(self.l2_op_timeout_secs)
    }

    pub fn l2_default_ttl(&self) -> Duration {
        Duration::from_secs(self.l2_default_ttl_secs)
    }
}

/// Settings for the agent selector.
///
/// The confidence constants reproduce the historical heuristic
/// `base + spread * (winner - runner_up)` clamped to `max`. They are plain
/// tunables, not a calibrated probability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SelectorSettings {
    /// Permits on the miss-path concurrency gate.
    pub gate_capacity: usize,
    /// L1 TTL for cached selection decisions, in seconds.
    pub decision_l1_ttl_secs: u64,
    /// L2 TTL for cached selection decisions, in seconds.
    pub decision_l2_ttl_secs: u64,
    /// Confidence floor when at least two candidates were ranked.
    pub confidence_base: f64,
    /// Multiplier applied to the winner/runner-up score difference.
    pub confidence_spread: f64,
    /// Confidence ceiling.
    pub confidence_max: f64,
    /// Confidence reported when exactly one candidate was ranked.
    pub single_candidate_confidence: f64,
}

impl Default for SelectorSettings {
    fn default() -> Self {
        Self {
            gate_capacity: 10,
            decision_l1_ttl_secs: 300,
            decision_l2_ttl_secs: 3600,
            confidence_base: 0.7,
            confidence_spread: 2.0,
            confidence_max: 0.95,
            single_candidate_confidence: 0.8,
        }
    }
}

impl SelectorSettings {
    pub fn decision_l1_ttl(&self) -> Duration {
        Duration::from_secs(self.decision_l1_ttl_secs)
    }

    pub fn decision_l2_ttl(&self) -> Duration {
        Duration::from_secs(self.decision_l2_ttl_secs)
    }
}

/// Settings for the per-agent performance tracker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackerSettings {
    /// Response time at or above which the speed score reaches zero.
    pub speed_ceiling_ms: f64,
    /// Bounded quality-sample history per agent; oldest samples drop first.
    pub quality_history_cap: usize,
    /// Score for unknown agents and the quality default with no samples.
    pub neutral_score: f64,
    /// Weight of the success rate in the composite score.
    pub success_weight: f64,
    /// Weight of the speed score in the composite score.
    pub speed_weight: f64,
    /// Weight of the average quality in the composite score.
    pub quality_weight: f64,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            speed_ceiling_ms: 5000.0,
            quality_history_cap: 100,
            neutral_score: 0.5,
            success_weight: 0.4,
            speed_weight: 0.3,
            quality_weight: 0.3,
        }
    }
}

/// Errors raised while loading configuration from disk.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

impl RouterConfig {
    /// Load configuration from a TOML file. Missing fields fall back to
    /// their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}
