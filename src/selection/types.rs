//! Shared selection types: agent profiles, request criteria and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Request complexity classes used by the compatibility filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    #[default]
    Medium,
    Complex,
}

/// One known agent and its live bookkeeping.
///
/// Profiles are created once from the registry at startup and are never
/// deleted; `usage_count`/`last_used` move only through the selector and
/// `performance_score` only through performance feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: String,
    pub name: String,
    /// Primary domain of the agent, e.g. "frontend" or "general_reasoning".
    pub specialization: String,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    /// Composite performance score in [0, 1], refreshed from the tracker.
    #[serde(default = "default_performance_score")]
    pub performance_score: f64,
    #[serde(default = "default_response_time_ms")]
    pub avg_response_time_ms: f64,
    /// Historical success rate in [0, 1].
    #[serde(default = "default_success_rate")]
    pub success_rate: f64,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
}

fn default_performance_score() -> f64 {
    0.5
}

fn default_response_time_ms() -> f64 {
    1000.0
}

fn default_success_rate() -> f64 {
    0.95
}

impl AgentProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>, specialization: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            specialization: specialization.into(),
            capabilities: BTreeSet::new(),
            performance_score: default_performance_score(),
            avg_response_time_ms: default_response_time_ms(),
            success_rate: default_success_rate(),
            usage_count: 0,
            last_used: None,
        }
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    pub fn with_success_rate(mut self, success_rate: f64) -> Self {
        self.success_rate = success_rate;
        self
    }

    pub fn with_response_time_ms(mut self, avg_response_time_ms: f64) -> Self {
        self.avg_response_time_ms = avg_response_time_ms;
        self
    }
}

/// What the caller is asking for. A value type: two criteria with the same
/// logical content are equal and produce the same cache key regardless of
/// the order context entries were inserted in (ordered maps throughout).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionCriteria {
    pub task_type: String,
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub context: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub user_preferences: Option<BTreeMap<String, serde_json::Value>>,
}

impl SelectionCriteria {
    pub fn new(task_type: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
            ..Self::default()
        }
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }
}

/// Outcome of one selection call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub selected_agent: AgentProfile,
    /// Heuristic confidence in [0, 1].
    pub confidence: f64,
    /// Human-readable summary of why the winner was picked. Diagnostic
    /// only; never feeds back into ranking.
    pub reasoning: String,
    /// Runners-up in rank order.
    pub alternatives: Vec<AgentProfile>,
    pub selection_time_ms: f64,
    pub cache_hit: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_criteria_equality_ignores_insertion_order() {
        let a = SelectionCriteria::new("frontend_development")
            .with_context("framework", serde_json::json!("react"))
            .with_context("deadline", serde_json::json!("tight"));
        let b = SelectionCriteria::new("frontend_development")
            .with_context("deadline", serde_json::json!("tight"))
            .with_context("framework", serde_json::json!("react"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_complexity_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Complexity::Complex).unwrap(),
            "\"complex\""
        );
        let parsed: Complexity = serde_json::from_str("\"simple\"").unwrap();
        assert_eq!(parsed, Complexity::Simple);
    }

    #[test]
    fn test_profile_builder_defaults() {
        let profile = AgentProfile::new("a1", "Frontend Bot", "frontend")
            .with_capability("react")
            .with_capability("css");
        assert_eq!(profile.usage_count, 0);
        assert!(profile.last_used.is_none());
        assert!(profile.capabilities.contains("react"));
        assert!((profile.performance_score - 0.5).abs() < f64::EPSILON);
    }
}
