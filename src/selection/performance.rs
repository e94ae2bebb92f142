//! Rolling per-agent performance metrics
//!
//! Each agent accumulates request counts, response-time sums and a bounded
//! quality history. The composite score blends success rate, speed and
//! quality; unknown agents get the neutral score instead of an error. Per
//! agent state lives in a concurrent map so feedback for one agent never
//! serializes against another.

use std::collections::{HashMap, VecDeque};

use dashmap::DashMap;
use serde::Serialize;

use crate::config::TrackerSettings;

#[derive(Debug, Default, Clone)]
struct AgentRecord {
    total_requests: u64,
    successful_requests: u64,
    total_response_time_ms: f64,
    quality_history: VecDeque<f64>,
}

/// Aggregated view of one agent's rolling metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub success_rate: f64,
    pub avg_response_time_ms: f64,
    /// Average of the bounded quality history; None before the first sample.
    pub avg_quality: Option<f64>,
    pub composite_score: f64,
}

#[derive(Debug)]
pub struct PerformanceTracker {
    settings: TrackerSettings,
    agents: DashMap<String, AgentRecord>,
}

impl PerformanceTracker {
    pub fn new(settings: TrackerSettings) -> Self {
        Self {
            settings,
            agents: DashMap::new(),
        }
    }

    /// Fold one observed execution into the agent's rolling sums. The
    /// quality history is capped; the oldest sample drops first.
    pub fn record_performance(
        &self,
        agent_id: &str,
        response_time_ms: f64,
        success: bool,
        quality_score: Option<f64>,
    ) {
        let mut record = self.agents.entry(agent_id.to_string()).or_default();
        record.total_requests += 1;
        if success {
            record.successful_requests += 1;
        }
        record.total_response_time_ms += response_time_ms.max(0.0);
        if let Some(quality) = quality_score {
            if record.quality_history.len() >= self.settings.quality_history_cap {
                record.quality_history.pop_front();
            }
            record.quality_history.push_back(quality.clamp(0.0, 1.0));
        }
    }

    /// Composite score in [0, 1]. Unknown agents score neutral.
    pub fn score(&self, agent_id: &str) -> f64 {
        match self.agents.get(agent_id) {
            Some(record) => self.composite(&record),
            None => self.settings.neutral_score,
        }
    }

    pub fn metrics(&self, agent_id: &str) -> Option<AgentMetrics> {
        self.agents
            .get(agent_id)
            .map(|record| self.build_metrics(&record))
    }

    pub fn all_metrics(&self) -> HashMap<String, AgentMetrics> {
        self.agents
            .iter()
            .map(|entry| (entry.key().clone(), self.build_metrics(entry.value())))
            .collect()
    }

    fn composite(&self, record: &AgentRecord) -> f64 {
        if record.total_requests == 0 {
            return self.settings.neutral_score;
        }
        let success_rate = record.successful_requests as f64 / record.total_requests as f64;
        let avg_ms = record.total_response_time_ms / record.total_requests as f64;
        let speed_score = (1.0 - avg_ms / self.settings.speed_ceiling_ms).max(0.0);
        let avg_quality = if record.quality_history.is_empty() {
            self.settings.neutral_score
        } else {
            record.quality_history.iter().sum::<f64>() / record.quality_history.len() as f64
        };
        let score = self.settings.success_weight * success_rate
            + self.settings.speed_weight * speed_score
            + self.settings.quality_weight * avg_quality;
        score.clamp(0.0, 1.0)
    }

    fn build_metrics(&self, record: &AgentRecord) -> AgentMetrics {
        let success_rate = if record.total_requests > 0 {
            record.successful_requests as f64 / record.total_requests as f64
        } else {
            0.0
        };
        let avg_response_time_ms = if record.total_requests > 0 {
            record.total_response_time_ms / record.total_requests as f64
        } else {
            0.0
        };
        let avg_quality = if record.quality_history.is_empty() {
            None
        } else {
            Some(record.quality_history.iter().sum::<f64>() / record.quality_history.len() as f64)
        };
        AgentMetrics {
            total_requests: record.total_requests,
            successful_requests: record.successful_requests,
            success_rate,
            avg_response_time_ms,
            avg_quality,
            composite_score: self.composite(record),
        }
    }
}
