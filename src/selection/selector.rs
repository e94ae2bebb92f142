//! Agent selection
//!
//! `select_agent` is a cached decision pipeline:
//!
//! key → cache probe → (hit: return) | (miss: gate → filter → score → rank
//! → update usage → cache decision → return)
//!
//! Cache hits never touch the concurrency gate, so cheap repeat reads are
//! never starved by expensive miss-path scoring. The gate brackets only the
//! scoring work and bookkeeping of a miss.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::caching::{keys, MultiLevelCache};
use crate::config::SelectorSettings;
use crate::selection::performance::{AgentMetrics, PerformanceTracker};
use crate::selection::registry::{AgentRegistry, RegistryError};
use crate::selection::types::{AgentProfile, Complexity, SelectionCriteria, SelectionResult};

/// Key prefix for cached selection decisions.
const DECISION_KEY_PREFIX: &str = "agent_selection";

/// A single candidate could not be scored. Failures are data: the selector
/// aggregates them and drops only the affected candidate.
#[derive(Debug, Clone, thiserror::Error)]
#[error("cannot score agent {agent_id}: {reason}")]
pub struct ScoringError {
    pub agent_id: String,
    pub reason: String,
}

impl ScoringError {
    fn new(agent_id: &str, reason: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    /// No usable candidate remained even after fallback synthesis. Treated
    /// as a fatal misconfiguration.
    #[error("no usable agent candidates remain")]
    Exhausted,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug)]
pub struct AgentSelector {
    /// Live agent pool. Keyed per agent so updating one profile never
    /// serializes against another.
    pool: DashMap<String, AgentProfile>,
    cache: Arc<MultiLevelCache<SelectionResult>>,
    tracker: Arc<PerformanceTracker>,
    registry: Arc<dyn AgentRegistry>,
    gate: Semaphore,
    settings: SelectorSettings,
}

impl AgentSelector {
    /// Build a selector over the registry's agent pool. Registry failures
    /// here are startup configuration errors and propagate.
    pub fn new(
        registry: Arc<dyn AgentRegistry>,
        cache: Arc<MultiLevelCache<SelectionResult>>,
        tracker: Arc<PerformanceTracker>,
        settings: SelectorSettings,
    ) -> Result<Self, RegistryError> {
        let profiles = registry.load()?;
        let pool = profiles
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect::<DashMap<_, _>>();
        let gate = Semaphore::new(settings.gate_capacity);
        Ok(Self {
            pool,
            cache,
            tracker,
            registry,
            gate,
            settings,
        })
    }

    /// Pick the best available agent for the criteria.
    ///
    /// Repeat calls with logically identical criteria are served from the
    /// decision cache without re-incrementing the winner's usage stats.
    pub async fn select_agent(
        &self,
        criteria: &SelectionCriteria,
    ) -> Result<SelectionResult, SelectionError> {
        let started = Instant::now();
        let key = keys::cache_key(DECISION_KEY_PREFIX, criteria);

        if let Some(mut cached) = self.cache.get(&key).await {
            cached.cache_hit = true;
            cached.selection_time_ms = elapsed_ms(started);
            debug!(task_type = %criteria.task_type, agent = %cached.selected_agent.id, "selection served from cache");
            return Ok(cached);
        }

        // Miss path: everything below runs under the gate.
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| SelectionError::Exhausted)?;

        let candidates = self.filter_candidates(criteria);
        let (mut ranked, degraded) = self.score_candidates(candidates);
        ranked.sort_by(rank_order);

        let winner = ranked.first().cloned().ok_or(SelectionError::Exhausted)?;
        let confidence = if degraded {
            0.0
        } else {
            self.confidence(&ranked)
        };
        let reasoning = if degraded {
            "selection degraded".to_string()
        } else {
            build_reasoning(&winner, criteria)
        };

        let selected = self.commit_usage(winner).await;
        let alternatives: Vec<AgentProfile> = ranked.iter().skip(1).take(3).cloned().collect();

        let result = SelectionResult {
            selected_agent: selected,
            confidence,
            reasoning,
            alternatives,
            selection_time_ms: elapsed_ms(started),
            cache_hit: false,
        };

        self.cache
            .set(
                &key,
                result.clone(),
                Some(self.settings.decision_l1_ttl()),
                self.settings.decision_l2_ttl(),
            )
            .await;
        debug!(task_type = %criteria.task_type, agent = %result.selected_agent.id, confidence = result.confidence, "selection computed");
        Ok(result)
    }

    /// Record execution feedback and refresh the pooled profile's score.
    pub fn record_performance(
        &self,
        agent_id: &str,
        response_time_ms: f64,
        success: bool,
        quality_score: Option<f64>,
    ) {
        self.tracker
            .record_performance(agent_id, response_time_ms, success, quality_score);
        let score = self.tracker.score(agent_id);
        if let Some(mut profile) = self.pool.get_mut(agent_id) {
            profile.performance_score = score;
        }
    }

    /// Rolling metrics for every agent with recorded feedback.
    pub fn agent_stats(&self) -> HashMap<String, AgentMetrics> {
        self.tracker.all_metrics()
    }

    /// Snapshot of one pooled profile.
    pub fn profile(&self, agent_id: &str) -> Option<AgentProfile> {
        self.pool.get(agent_id).map(|p| p.clone())
    }

    /// Number of miss-path computations currently holding a gate permit.
    pub fn in_flight_misses(&self) -> usize {
        self.settings
            .gate_capacity
            .saturating_sub(self.gate.available_permits())
    }

    /// Compatible candidates, falling back to the whole pool and then to a
    /// synthesized default so a result can always be produced.
    fn filter_candidates(&self, criteria: &SelectionCriteria) -> Vec<AgentProfile> {
        let matching: Vec<AgentProfile> = self
            .pool
            .iter()
            .filter(|entry| profile_matches(entry.value(), criteria))
            .map(|entry| entry.value().clone())
            .collect();
        if !matching.is_empty() {
            return matching;
        }
        if !self.pool.is_empty() {
            debug!(task_type = %criteria.task_type, "no compatible agents, falling back to full pool");
            return self.pool.iter().map(|entry| entry.value().clone()).collect();
        }
        debug!("agent pool is empty, synthesizing default agent");
        vec![fallback_profile()]
    }

    /// Refresh every candidate's score from the tracker. Candidates that
    /// fail to score are dropped; if all fail, the synthesized default
    /// carries a degraded zero-confidence result.
    fn score_candidates(&self, candidates: Vec<AgentProfile>) -> (Vec<AgentProfile>, bool) {
        let mut scored = Vec::with_capacity(candidates.len());
        let mut errors: Vec<ScoringError> = Vec::new();
        for mut profile in candidates {
            match self.refresh_score(&mut profile) {
                Ok(()) => scored.push(profile),
                Err(e) => errors.push(e),
            }
        }
        for e in &errors {
            warn!(agent = %e.agent_id, reason = %e.reason, "candidate dropped from ranking");
        }
        if scored.is_empty() {
            let mut fallback = fallback_profile();
            fallback.performance_score = 0.0;
            return (vec![fallback], true);
        }
        (scored, false)
    }

    fn refresh_score(&self, profile: &mut AgentProfile) -> Result<(), ScoringError> {
        if !profile.success_rate.is_finite() || !(0.0..=1.0).contains(&profile.success_rate) {
            return Err(ScoringError::new(&profile.id, "success_rate out of range"));
        }
        if !profile.avg_response_time_ms.is_finite() || profile.avg_response_time_ms < 0.0 {
            return Err(ScoringError::new(
                &profile.id,
                "avg_response_time_ms out of range",
            ));
        }
        // Never trust a stale score carried on the profile.
        profile.performance_score = self.tracker.score(&profile.id);
        Ok(())
    }

    fn confidence(&self, ranked: &[AgentProfile]) -> f64 {
        if ranked.len() >= 2 {
            let spread = ranked[0].performance_score - ranked[1].performance_score;
            (self.settings.confidence_base + self.settings.confidence_spread * spread)
                .clamp(self.settings.confidence_base, self.settings.confidence_max)
        } else {
            self.settings.single_candidate_confidence
        }
    }

    /// Bump the winner's usage bookkeeping and write it back, best-effort.
    async fn commit_usage(&self, winner: AgentProfile) -> AgentProfile {
        let updated = match self.pool.get_mut(&winner.id) {
            Some(mut profile) => {
                profile.usage_count += 1;
                profile.last_used = Some(Utc::now());
                profile.performance_score = winner.performance_score;
                profile.clone()
            }
            None => {
                // Synthesized fallback agents live outside the pool.
                let mut profile = winner;
                profile.usage_count += 1;
                profile.last_used = Some(Utc::now());
                profile
            }
        };
        if let Err(e) = self.registry.persist(&updated).await {
            warn!(agent = %updated.id, error = %e, "profile write-back failed");
        }
        updated
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Ranking: performance score descending, then response time ascending.
fn rank_order(a: &AgentProfile, b: &AgentProfile) -> Ordering {
    b.performance_score
        .partial_cmp(&a.performance_score)
        .unwrap_or(Ordering::Equal)
        .then(
            a.avg_response_time_ms
                .partial_cmp(&b.avg_response_time_ms)
                .unwrap_or(Ordering::Equal),
        )
}

/// Example compatibility policy: complexity gates the candidate class and
/// keywords derived from the task type narrow it down.
fn profile_matches(profile: &AgentProfile, criteria: &SelectionCriteria) -> bool {
    complexity_compatible(profile, criteria.complexity) && keywords_compatible(profile, criteria)
}

fn complexity_compatible(profile: &AgentProfile, complexity: Complexity) -> bool {
    match complexity {
        Complexity::Simple | Complexity::Medium => true,
        // Complex work needs broad reasoning rather than a narrow toolset.
        Complexity::Complex => {
            profile.specialization.to_lowercase().contains("general")
                || profile
                    .capabilities
                    .iter()
                    .any(|c| c.contains("reasoning") || c.contains("general"))
        }
    }
}

fn keywords_compatible(profile: &AgentProfile, criteria: &SelectionCriteria) -> bool {
    let keywords = task_keywords(criteria);
    if keywords.is_empty() {
        return true;
    }
    let specialization = profile.specialization.to_lowercase();
    keywords.iter().any(|kw| {
        specialization.contains(kw)
            || profile
                .capabilities
                .iter()
                .any(|c| c.to_lowercase().contains(kw))
    })
}

/// Keywords come from the task type plus an optional explicit
/// `required_capabilities` list in the context.
fn task_keywords(criteria: &SelectionCriteria) -> Vec<String> {
    let mut keywords: Vec<String> = criteria
        .task_type
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() > 2)
        .map(|token| token.to_lowercase())
        .collect();
    if let Some(serde_json::Value::Array(required)) = criteria.context.get("required_capabilities")
    {
        keywords.extend(
            required
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_lowercase()),
        );
    }
    keywords
}

fn fallback_profile() -> AgentProfile {
    let mut profile = AgentProfile::new("fallback-default", "Default Agent", "general");
    profile.capabilities.insert("general".to_string());
    profile.performance_score = 0.3;
    profile.avg_response_time_ms = 2000.0;
    profile.success_rate = 0.5;
    profile
}

fn build_reasoning(winner: &AgentProfile, criteria: &SelectionCriteria) -> String {
    let tier = if winner.performance_score >= 0.8 {
        "high"
    } else if winner.performance_score >= 0.6 {
        "solid"
    } else {
        "developing"
    };
    let specialization_note = if keywords_compatible(winner, criteria) {
        format!("specialization '{}' matches the task", winner.specialization)
    } else {
        format!(
            "specialization '{}' taken as best available",
            winner.specialization
        )
    };
    format!(
        "{}; {} performance track record (score {:.2}); suited to {:?} complexity work",
        specialization_note, tier, winner.performance_score, criteria.complexity
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caching::L1Cache;
    use crate::config::TrackerSettings;
    use crate::selection::registry::InMemoryAgentRegistry;
    use std::time::Duration;

    fn selector_with(agents: Vec<AgentProfile>) -> AgentSelector {
        let registry = Arc::new(InMemoryAgentRegistry::new(agents));
        let cache = Arc::new(MultiLevelCache::new(
            L1Cache::new(100, Duration::from_secs(60)),
            None,
            0.1,
            Duration::from_secs(3600),
        ));
        let tracker = Arc::new(PerformanceTracker::new(TrackerSettings::default()));
        AgentSelector::new(registry, cache, tracker, SelectorSettings::default()).unwrap()
    }

    fn frontend_agent() -> AgentProfile {
        AgentProfile::new("frontend-1", "Frontend Specialist", "frontend")
            .with_capability("react")
            .with_capability("frontend")
            .with_response_time_ms(800.0)
    }

    fn generalist_agent() -> AgentProfile {
        AgentProfile::new("generalist-1", "Generalist", "general_reasoning")
            .with_capability("general")
            .with_capability("reasoning")
            .with_response_time_ms(1500.0)
    }

    #[test]
    fn test_keywords_from_task_type() {
        let criteria = SelectionCriteria::new("frontend_development");
        let kws = task_keywords(&criteria);
        assert!(kws.contains(&"frontend".to_string()));
        assert!(kws.contains(&"development".to_string()));
    }

    #[test]
    fn test_complex_work_requires_reasoning() {
        let frontend = frontend_agent();
        let generalist = generalist_agent();
        assert!(!complexity_compatible(&frontend, Complexity::Complex));
        assert!(complexity_compatible(&generalist, Complexity::Complex));
        assert!(complexity_compatible(&frontend, Complexity::Simple));
    }

    #[test]
    fn test_rank_order_breaks_ties_on_latency() {
        let mut fast = frontend_agent();
        let mut slow = generalist_agent();
        fast.performance_score = 0.5;
        slow.performance_score = 0.5;
        assert_eq!(rank_order(&fast, &slow), Ordering::Less);
    }

    #[tokio::test]
    async fn test_malformed_candidate_is_dropped() {
        let broken = AgentProfile::new("broken", "Broken", "frontend")
            .with_capability("frontend")
            .with_success_rate(f64::NAN);
        let selector = selector_with(vec![broken, frontend_agent()]);

        let criteria = SelectionCriteria::new("frontend_development");
        let result = selector.select_agent(&criteria).await.unwrap();
        assert_eq!(result.selected_agent.id, "frontend-1");
    }

    #[tokio::test]
    async fn test_all_candidates_malformed_degrades() {
        let broken = AgentProfile::new("broken", "Broken", "frontend")
            .with_capability("frontend")
            .with_success_rate(2.5);
        let selector = selector_with(vec![broken]);

        let criteria = SelectionCriteria::new("frontend_development");
        let result = selector.select_agent(&criteria).await.unwrap();
        assert_eq!(result.reasoning, "selection degraded");
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.selected_agent.id, "fallback-default");
    }
}
