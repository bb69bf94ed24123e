//! Reliability scoring and aggregate coordination statistics.

use crate::registry::Registry;
use crate::task_queue::TaskStore;
use crate::types::{MAX_PERFORMANCE_SCORE, MIN_PERFORMANCE_SCORE};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Multiplier applied to an agent's score after a successful task.
pub const SUCCESS_GROWTH: f64 = 1.01;
/// Multiplier applied to an agent's score after a failed task.
pub const FAILURE_DECAY: f64 = 0.99;

/// Fold one task outcome into a performance score, staying within bounds.
pub fn adjust_performance_score(score: f64, success: bool) -> f64 {
    if success {
        (score * SUCCESS_GROWTH).min(MAX_PERFORMANCE_SCORE)
    } else {
        (score * FAILURE_DECAY).max(MIN_PERFORMANCE_SCORE)
    }
}

/// Fairness of work distribution in `[0, 1]`; 1.0 means every agent has the same load.
///
/// Returns `None` for an empty agent set.
pub fn load_balancing_score(loads: &[u64]) -> Option<f64> {
    let max = *loads.iter().max()?;
    let min = *loads.iter().min()?;
    Some(1.0 - (max - min) as f64 / max.max(1) as f64)
}

/// Session-wide statistics, updated whenever a task finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationStats {
    /// When this coordinator instance started.
    pub session_started: DateTime<Utc>,
    /// Tasks finished since start, failures included.
    pub total_tasks_processed: u64,
    /// Agents not offline at the last status read.
    pub active_agents: usize,
    /// Share of finished tasks that completed without an error.
    pub success_rate: f64,
    /// Mean seconds from assignment to completion.
    pub average_task_duration: f64,
    /// Evenness of lifetime assignments across agents, in `[0, 1]`.
    pub load_balancing_score: f64,
}

impl CoordinationStats {
    /// Fresh statistics for a session starting at `session_started`.
    pub fn new(session_started: DateTime<Utc>) -> Self {
        Self {
            session_started,
            total_tasks_processed: 0,
            active_agents: 0,
            success_rate: 0.0,
            average_task_duration: 0.0,
            load_balancing_score: 1.0,
        }
    }

    /// Recompute rates from the finished tasks and current agent loads.
    ///
    /// Each aggregate keeps its previous value when it has no input yet.
    pub fn recompute(&mut self, registry: &Registry, tasks: &TaskStore) {
        let mut finished = 0usize;
        let mut succeeded = 0usize;
        let mut durations = Vec::new();
        for task in tasks.completed_tasks() {
            finished += 1;
            if task.error.is_none() {
                succeeded += 1;
            }
            if let Some(secs) = task.duration_secs() {
                durations.push(secs);
            }
        }

        if finished > 0 {
            self.success_rate = succeeded as f64 / finished as f64;
        }
        if !durations.is_empty() {
            self.average_task_duration = durations.iter().sum::<f64>() / durations.len() as f64;
        }
        if let Some(score) = load_balancing_score(&registry.loads()) {
            self.load_balancing_score = score;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_score_grows_slowly_and_caps() {
        assert!((adjust_performance_score(1.0, true) - 1.01).abs() < 1e-12);
        assert_eq!(adjust_performance_score(1.99, true), MAX_PERFORMANCE_SCORE);
        assert_eq!(adjust_performance_score(2.0, true), MAX_PERFORMANCE_SCORE);
    }

    #[test]
    fn test_score_decays_slowly_and_floors() {
        assert!((adjust_performance_score(1.0, false) - 0.99).abs() < 1e-12);
        assert_eq!(adjust_performance_score(0.1, false), MIN_PERFORMANCE_SCORE);
    }

    #[test]
    fn test_score_stays_in_bounds_over_long_runs() {
        let mut score = 1.0;
        for _ in 0..1000 {
            score = adjust_performance_score(score, false);
            assert!((MIN_PERFORMANCE_SCORE..=MAX_PERFORMANCE_SCORE).contains(&score));
        }
        for _ in 0..1000 {
            score = adjust_performance_score(score, true);
            assert!((MIN_PERFORMANCE_SCORE..=MAX_PERFORMANCE_SCORE).contains(&score));
        }
        assert_eq!(score, MAX_PERFORMANCE_SCORE);
    }

    #[test]
    fn test_load_balancing_score() {
        assert_eq!(load_balancing_score(&[]), None);
        assert_eq!(load_balancing_score(&[0, 0, 0]), Some(1.0));
        assert_eq!(load_balancing_score(&[3, 3]), Some(1.0));
        assert_eq!(load_balancing_score(&[4, 0]), Some(0.0));
        assert_eq!(load_balancing_score(&[4, 2]), Some(0.5));
    }

    #[test]
    fn test_new_stats_defaults() {
        let stats = CoordinationStats::new(Utc::now());
        assert_eq!(stats.total_tasks_processed, 0);
        assert_eq!(stats.load_balancing_score, 1.0);
        assert_eq!(stats.success_rate, 0.0);
    }
}
