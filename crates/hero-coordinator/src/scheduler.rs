//! Capability-constrained, greedy best-of-available task assignment.
//!
//! One pass walks the queue in priority order. For each task it picks the
//! best idle agent whose capabilities cover the task and commits the
//! assignment before moving on, so earlier (higher priority) tasks get first
//! pick. This is O(tasks x agents) and deliberately not a global matching.

use crate::registry::Registry;
use crate::task_queue::TaskStore;
use crate::types::{Agent, TaskStatus};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::debug;
use uuid::Uuid;

/// A task handed to an agent during a scheduling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    /// Task that left the queue.
    pub task_id: Uuid,
    /// Agent now holding it.
    pub agent_id: Uuid,
}

/// Ranking score: performance score weighted by historical success rate.
pub fn candidate_score(agent: &Agent) -> f64 {
    agent.performance_score * agent.success_rate()
}

/// Orders candidates so that the better one compares greater.
///
/// Equal scores go to the agent registered first, then to the lower id.
fn rank(a: &Agent, b: &Agent) -> Ordering {
    candidate_score(a)
        .total_cmp(&candidate_score(b))
        .then_with(|| (b.registered_at, b.id).cmp(&(a.registered_at, a.id)))
}

/// Best idle agent able to serve `required`, if any.
pub fn select_agent<'a, I>(agents: I, required: &BTreeSet<String>) -> Option<&'a Agent>
where
    I: IntoIterator<Item = &'a Agent>,
{
    agents
        .into_iter()
        .filter(|agent| agent.is_available() && agent.can_handle(required))
        .max_by(|a, b| rank(a, b))
}

/// Run one scheduling pass, mutating tasks and agents for every assignment made.
pub fn run_pass(registry: &mut Registry, tasks: &mut TaskStore, now: DateTime<Utc>) -> Vec<Assignment> {
    let mut assignments = Vec::new();
    let queued: Vec<Uuid> = tasks.queued().to_vec();

    for task_id in queued {
        if registry.idle_count() == 0 {
            break;
        }
        let required = match tasks.get(task_id) {
            Some(task) if task.status == TaskStatus::Pending => task.required_capabilities.clone(),
            _ => continue,
        };
        let Some(agent_id) = select_agent(registry.iter(), &required).map(|a| a.id) else {
            debug!(task_id = %task_id, "No capable idle agent; task stays queued");
            continue;
        };

        if tasks.mark_assigned(task_id, agent_id, now) && registry.assign(agent_id, task_id) {
            assignments.push(Assignment { task_id, agent_id });
        }
    }

    assignments
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::{AgentStatus, Payload, Task, TaskPriority};
    use chrono::Duration;

    fn caps(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    fn register(registry: &mut Registry, name: &str, list: &[&str], at: DateTime<Utc>) -> Uuid {
        registry.register(name, "worker", caps(list), "hero", Payload::new(), at)
    }

    fn submit(tasks: &mut TaskStore, name: &str, list: &[&str], priority: TaskPriority) -> Uuid {
        tasks.submit(Task::new(name, "", caps(list), priority, Utc::now()))
    }

    #[test]
    fn test_candidate_score_new_agent() {
        let agent = Agent::new("a", "t", Vec::new(), "hero", Utc::now());
        assert_eq!(candidate_score(&agent), 1.0);
    }

    #[test]
    fn test_candidate_score_weights_success_rate() {
        let mut agent = Agent::new("a", "t", Vec::new(), "hero", Utc::now());
        agent.performance_score = 1.5;
        agent.total_tasks = 4;
        agent.successful_tasks = 2;
        assert_eq!(candidate_score(&agent), 0.75);
    }

    #[test]
    fn test_select_requires_capability_superset() {
        let now = Utc::now();
        let mut narrow = Agent::new("narrow", "t", caps(&["x"]), "hero", now);
        narrow.status = AgentStatus::Idle;
        let mut wide = Agent::new("wide", "t", caps(&["x", "y"]), "hero", now);
        wide.status = AgentStatus::Idle;
        let required: BTreeSet<String> = caps(&["x", "y"]).into_iter().collect();

        let chosen = select_agent([&narrow, &wide], &required).unwrap();
        assert_eq!(chosen.name, "wide");
    }

    #[test]
    fn test_select_skips_non_idle() {
        let now = Utc::now();
        let mut busy = Agent::new("busy", "t", caps(&["x"]), "hero", now);
        busy.status = AgentStatus::Busy;
        let mut offline = Agent::new("offline", "t", caps(&["x"]), "hero", now);
        offline.status = AgentStatus::Offline;
        let starting = Agent::new("starting", "t", caps(&["x"]), "hero", now);
        let required: BTreeSet<String> = caps(&["x"]).into_iter().collect();

        assert!(select_agent([&busy, &offline, &starting], &required).is_none());
    }

    #[test]
    fn test_select_prefers_higher_score() {
        let now = Utc::now();
        let mut weak = Agent::new("weak", "t", caps(&["x"]), "hero", now);
        weak.status = AgentStatus::Idle;
        weak.performance_score = 0.9;
        let mut strong = Agent::new("strong", "t", caps(&["x"]), "hero", now + Duration::seconds(1));
        strong.status = AgentStatus::Idle;
        strong.performance_score = 1.2;
        let required = BTreeSet::new();

        assert_eq!(select_agent([&weak, &strong], &required).unwrap().name, "strong");
        assert_eq!(select_agent([&strong, &weak], &required).unwrap().name, "strong");
    }

    #[test]
    fn test_tie_goes_to_earliest_registration() {
        let now = Utc::now();
        let mut late = Agent::new("late", "t", caps(&["x"]), "hero", now + Duration::seconds(5));
        late.status = AgentStatus::Idle;
        let mut early = Agent::new("early", "t", caps(&["x"]), "hero", now);
        early.status = AgentStatus::Idle;
        let required = BTreeSet::new();

        assert_eq!(select_agent([&late, &early], &required).unwrap().name, "early");
        assert_eq!(select_agent([&early, &late], &required).unwrap().name, "early");
    }

    #[test]
    fn test_tie_with_same_registration_goes_to_lowest_id() {
        let now = Utc::now();
        let mut a = Agent::new("a", "t", Vec::new(), "hero", now);
        a.status = AgentStatus::Idle;
        let mut b = Agent::new("b", "t", Vec::new(), "hero", now);
        b.status = AgentStatus::Idle;
        let expected = if a.id < b.id { a.id } else { b.id };
        let required = BTreeSet::new();

        assert_eq!(select_agent([&a, &b], &required).unwrap().id, expected);
        assert_eq!(select_agent([&b, &a], &required).unwrap().id, expected);
    }

    #[test]
    fn test_pass_assigns_in_priority_order() {
        let mut registry = Registry::new();
        let mut tasks = TaskStore::new();
        let now = Utc::now();
        let agent = register(&mut registry, "only", &["x"], now);

        let low = submit(&mut tasks, "low", &["x"], TaskPriority::Low);
        let urgent = submit(&mut tasks, "urgent", &["x"], TaskPriority::Urgent);

        let assignments = run_pass(&mut registry, &mut tasks, now);
        assert_eq!(
            assignments,
            vec![Assignment {
                task_id: urgent,
                agent_id: agent
            }]
        );
        assert_eq!(tasks.queued(), &[low]);
        assert_eq!(registry.get(agent).unwrap().current_task, Some(urgent));
    }

    #[test]
    fn test_pass_leaves_unmatched_tasks_queued() {
        let mut registry = Registry::new();
        let mut tasks = TaskStore::new();
        let now = Utc::now();
        register(&mut registry, "x-only", &["x"], now);
        let needs_y = submit(&mut tasks, "needs-y", &["y"], TaskPriority::Urgent);
        let needs_x = submit(&mut tasks, "needs-x", &["x"], TaskPriority::Low);

        let assignments = run_pass(&mut registry, &mut tasks, now);
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].task_id, needs_x);
        assert_eq!(tasks.queued(), &[needs_y]);
    }

    #[test]
    fn test_pass_is_greedy_not_optimal() {
        // The urgent task only needs "x" and grabs the generalist first,
        // leaving the "x"+"y" task without a capable agent.
        let mut registry = Registry::new();
        let mut tasks = TaskStore::new();
        let now = Utc::now();
        let generalist = register(&mut registry, "generalist", &["x", "y"], now);
        let specialist = register(&mut registry, "specialist", &["x"], now + Duration::seconds(1));
        // Make the generalist strictly preferred.
        let mut boosted = registry.get(generalist).unwrap().clone();
        boosted.performance_score = 1.5;
        registry.restore(boosted);

        let simple = submit(&mut tasks, "simple", &["x"], TaskPriority::Urgent);
        let demanding = submit(&mut tasks, "demanding", &["x", "y"], TaskPriority::Normal);

        let assignments = run_pass(&mut registry, &mut tasks, now);
        assert_eq!(
            assignments,
            vec![Assignment {
                task_id: simple,
                agent_id: generalist
            }]
        );
        assert_eq!(tasks.queued(), &[demanding]);
        assert_eq!(registry.get(specialist).unwrap().status, AgentStatus::Idle);
    }

    #[test]
    fn test_pass_never_double_books_an_agent() {
        let mut registry = Registry::new();
        let mut tasks = TaskStore::new();
        let now = Utc::now();
        register(&mut registry, "a", &["x"], now);
        register(&mut registry, "b", &["x"], now);
        for i in 0..5 {
            submit(&mut tasks, &format!("t{i}"), &["x"], TaskPriority::Normal);
        }

        let assignments = run_pass(&mut registry, &mut tasks, now);
        assert_eq!(assignments.len(), 2);
        assert_ne!(assignments[0].agent_id, assignments[1].agent_id);
        assert_eq!(tasks.queue_len(), 3);
        assert_eq!(tasks.running_count(), 2);
    }
}
