use crate::metrics::CoordinationStats;
use crate::registry::Registry;
use crate::task_queue::TaskStore;
use crate::types::{AgentStatus, TaskStatus};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Point-in-time view of the coordinator, as returned by `get_system_status`
/// and written to the coordination snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    /// When the report was built.
    pub timestamp: DateTime<Utc>,
    /// Session statistics, with `active_agents` refreshed.
    pub coordination_stats: CoordinationStats,
    /// Agent counts.
    pub agents: AgentBreakdown,
    /// Task counts.
    pub tasks: TaskBreakdown,
    /// Headline performance figures.
    pub performance: PerformanceSummary,
    /// Tasks created inside the activity window, most recently started first.
    pub recent_activity: Vec<ActivityEntry>,
}

/// Agent counts by status and by framework.
#[derive(Debug, Clone, Serialize)]
pub struct AgentBreakdown {
    /// Every registered agent.
    pub total: usize,
    /// Agents not offline.
    pub active: usize,
    /// Count per status; every status is listed.
    pub by_status: BTreeMap<AgentStatus, usize>,
    /// Count per originating framework.
    pub by_framework: BTreeMap<String, usize>,
}

/// Task counts by lifecycle stage.
#[derive(Debug, Clone, Serialize)]
pub struct TaskBreakdown {
    /// Waiting for an agent.
    pub pending: usize,
    /// Held by an agent.
    pub running: usize,
    /// Finished, successfully or not.
    pub completed: usize,
    /// Length of the pending queue.
    pub queue_length: usize,
}

/// Headline figures copied from [`CoordinationStats`].
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSummary {
    /// Share of finished tasks without an error.
    pub success_rate: f64,
    /// Mean task duration in seconds.
    pub avg_duration: f64,
    /// Load-balancing score in `[0, 1]`.
    pub load_balance: f64,
}

/// A task created inside the activity window.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    /// Task id.
    pub task_id: Uuid,
    /// Task name.
    pub name: String,
    /// Task status.
    pub status: TaskStatus,
    /// Name of the assigned agent.
    pub agent: Option<String>,
    /// When the task was assigned.
    pub started: Option<DateTime<Utc>>,
    /// Seconds from assignment to completion.
    pub duration: Option<f64>,
}

/// Assemble a status report. Callers sweep stale agents beforehand.
pub fn build_status(
    registry: &Registry,
    tasks: &TaskStore,
    stats: &CoordinationStats,
    now: DateTime<Utc>,
    activity_window: Duration,
) -> SystemStatus {
    let by_status = registry.status_counts();
    let offline = by_status.get(&AgentStatus::Offline).copied().unwrap_or(0);
    let active = registry.len() - offline;

    let mut coordination_stats = stats.clone();
    coordination_stats.active_agents = active;

    SystemStatus {
        timestamp: now,
        performance: PerformanceSummary {
            success_rate: stats.success_rate,
            avg_duration: stats.average_task_duration,
            load_balance: stats.load_balancing_score,
        },
        coordination_stats,
        agents: AgentBreakdown {
            total: registry.len(),
            active,
            by_status,
            by_framework: registry.framework_counts(),
        },
        tasks: TaskBreakdown {
            pending: tasks.pending_count(),
            running: tasks.running_count(),
            completed: tasks.completed_count(),
            queue_length: tasks.queue_len(),
        },
        recent_activity: recent_activity(
            registry,
            tasks,
            now.checked_sub_signed(activity_window)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        ),
    }
}

/// Tasks created at or after `cutoff`, most recently started first.
///
/// Tasks that never started sort after every started task; equal keys keep
/// creation order.
pub fn recent_activity(
    registry: &Registry,
    tasks: &TaskStore,
    cutoff: DateTime<Utc>,
) -> Vec<ActivityEntry> {
    let mut entries: Vec<ActivityEntry> = tasks
        .all_tasks()
        .filter(|task| task.created_at >= cutoff)
        .map(|task| ActivityEntry {
            task_id: task.id,
            name: task.name.clone(),
            status: task.status,
            agent: task
                .assigned_agent
                .and_then(|id| registry.get(id))
                .map(|agent| agent.name.clone()),
            started: task.started_at,
            duration: task.duration_secs(),
        })
        .collect();
    // `None < Some(_)`, so a descending sort puts unstarted tasks last.
    entries.sort_by(|a, b| b.started.cmp(&a.started));
    entries
}
