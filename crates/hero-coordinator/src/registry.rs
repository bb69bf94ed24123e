use crate::metrics::adjust_performance_score;
use crate::types::{Agent, AgentStatus, Payload, MAX_PERFORMANCE_SCORE, MIN_PERFORMANCE_SCORE};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Directory of every agent ever registered. Agents are never removed.
#[derive(Debug, Default)]
pub struct Registry {
    agents: HashMap<Uuid, Agent>,
}

/// Options that shape how a heartbeat is applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeartbeatRules {
    /// A bare heartbeat brings an offline agent back.
    pub revive: bool,
    /// The agent's `current_task` still refers to an assigned task.
    pub holds_assigned_task: bool,
}

impl Registry {
    /// An empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new agent and make it available for work.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        agent_type: impl Into<String>,
        capabilities: impl IntoIterator<Item = String>,
        framework: impl Into<String>,
        metadata: Payload,
        now: DateTime<Utc>,
    ) -> Uuid {
        let mut agent = Agent::new(name, agent_type, capabilities, framework, now);
        agent.metadata = metadata;
        debug!(agent_id = %agent.id, from = %agent.status, to = %AgentStatus::Idle, "Agent ready");
        agent.status = AgentStatus::Idle;
        let id = agent.id;
        self.agents.insert(id, agent);
        id
    }

    /// Re-insert an agent recovered from a snapshot, clamping its score into range.
    pub fn restore(&mut self, mut agent: Agent) {
        if !agent.performance_score.is_finite() {
            agent.performance_score = MIN_PERFORMANCE_SCORE;
        }
        agent.performance_score = agent
            .performance_score
            .clamp(MIN_PERFORMANCE_SCORE, MAX_PERFORMANCE_SCORE);
        agent.successful_tasks = agent.successful_tasks.min(agent.total_tasks);
        self.agents.insert(agent.id, agent);
    }

    /// Record a heartbeat. Returns `false` when the id is unknown.
    ///
    /// An explicit status overrides the current one; a `busy` report from an
    /// agent without an assigned task is ignored. Reporting `idle` or
    /// `starting` drops the agent's current task, which the caller is
    /// expected to put back in the queue.
    pub fn heartbeat(
        &mut self,
        id: Uuid,
        status: Option<AgentStatus>,
        metadata: Option<Payload>,
        now: DateTime<Utc>,
        rules: HeartbeatRules,
    ) -> bool {
        let Some(agent) = self.agents.get_mut(&id) else {
            return false;
        };
        agent.last_heartbeat = now;

        let next = resolve_status(agent.status, status, rules);
        if next != agent.status {
            info!(agent_id = %id, from = %agent.status, to = %next, "Agent status changed by heartbeat");
        }
        if status == Some(AgentStatus::Busy) && next != AgentStatus::Busy {
            warn!(agent_id = %id, "Ignoring busy heartbeat from agent without an assigned task");
        }
        agent.status = next;
        if matches!(next, AgentStatus::Idle | AgentStatus::Starting) {
            agent.current_task = None;
        }

        if let Some(metadata) = metadata {
            agent.metadata.extend(metadata);
        }
        true
    }

    /// Mark every agent whose last heartbeat is older than `timeout` as offline.
    ///
    /// Returns the ids that changed state. Agents stay in the directory.
    pub fn sweep_stale(&mut self, now: DateTime<Utc>, timeout: Duration) -> Vec<Uuid> {
        let mut offlined = Vec::new();
        for agent in self.agents.values_mut() {
            if agent.status != AgentStatus::Offline && now - agent.last_heartbeat > timeout {
                debug!(agent_id = %agent.id, last_heartbeat = %agent.last_heartbeat, "Agent went stale");
                agent.status = AgentStatus::Offline;
                offlined.push(agent.id);
            }
        }
        offlined
    }

    /// Hand `task_id` to an idle agent.
    pub(crate) fn assign(&mut self, agent_id: Uuid, task_id: Uuid) -> bool {
        match self.agents.get_mut(&agent_id) {
            Some(agent) if agent.is_available() => {
                agent.status = AgentStatus::Busy;
                agent.current_task = Some(task_id);
                agent.total_tasks += 1;
                true
            }
            _ => false,
        }
    }

    /// Free an agent after its task finished and fold the outcome into its score.
    ///
    /// A busy agent goes back to idle; an agent that reported itself offline
    /// or in error keeps that status.
    pub(crate) fn release(&mut self, agent_id: Uuid, task_id: Uuid, success: bool) -> bool {
        let Some(agent) = self.agents.get_mut(&agent_id) else {
            return false;
        };
        if agent.current_task != Some(task_id) {
            warn!(agent_id = %agent_id, task_id = %task_id, current = ?agent.current_task, "Released agent was holding a different task");
        }
        if agent.current_task == Some(task_id) || agent.current_task.is_none() {
            agent.current_task = None;
            if matches!(agent.status, AgentStatus::Busy | AgentStatus::Starting) {
                agent.status = AgentStatus::Idle;
            }
        }
        if success {
            agent.successful_tasks += 1;
        }
        agent.performance_score = adjust_performance_score(agent.performance_score, success);
        true
    }

    /// Agent by id.
    pub fn get(&self, id: Uuid) -> Option<&Agent> {
        self.agents.get(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.agents.len()
    }

    /// Every agent, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    /// Agents in registration order (ties broken by id).
    pub fn ordered(&self) -> Vec<&Agent> {
        let mut agents: Vec<&Agent> = self.agents.values().collect();
        agents.sort_by_key(|a| (a.registered_at, a.id));
        agents
    }

    /// Agents the scheduler may hand work to.
    pub fn idle_count(&self) -> usize {
        self.agents.values().filter(|a| a.is_available()).count()
    }

    /// Agent counts per status; every status is present, zero or not.
    pub fn status_counts(&self) -> BTreeMap<AgentStatus, usize> {
        let mut counts: BTreeMap<AgentStatus, usize> =
            AgentStatus::ALL.into_iter().map(|s| (s, 0)).collect();
        for agent in self.agents.values() {
            *counts.entry(agent.status).or_default() += 1;
        }
        counts
    }

    /// Agent counts per originating framework.
    pub fn framework_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for agent in self.agents.values() {
            *counts.entry(agent.framework.clone()).or_default() += 1;
        }
        counts
    }

    /// Lifetime assignment counts, one per agent.
    pub fn loads(&self) -> Vec<u64> {
        self.agents.values().map(|a| a.total_tasks).collect()
    }
}

fn resolve_status(
    current: AgentStatus,
    requested: Option<AgentStatus>,
    rules: HeartbeatRules,
) -> AgentStatus {
    match requested {
        Some(AgentStatus::Busy) if !rules.holds_assigned_task => current,
        Some(status) => status,
        None if current == AgentStatus::Offline && rules.revive => {
            if rules.holds_assigned_task {
                AgentStatus::Busy
            } else {
                AgentStatus::Idle
            }
        }
        None => current,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn register(registry: &mut Registry, name: &str, caps: &[&str], now: DateTime<Utc>) -> Uuid {
        registry.register(
            name,
            "worker",
            caps.iter().map(|c| c.to_string()),
            "hero",
            Payload::new(),
            now,
        )
    }

    #[test]
    fn test_register_starts_idle() {
        let mut registry = Registry::new();
        let id = register(&mut registry, "a", &["x"], Utc::now());
        let agent = registry.get(id).unwrap();
        assert_eq!(agent.status, AgentStatus::Idle);
        assert_eq!(agent.performance_score, 1.0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_assigns_unique_ids() {
        let mut registry = Registry::new();
        let now = Utc::now();
        let a = register(&mut registry, "same", &[], now);
        let b = register(&mut registry, "same", &[], now);
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_heartbeat_unknown_agent() {
        let mut registry = Registry::new();
        assert!(!registry.heartbeat(
            Uuid::new_v4(),
            None,
            None,
            Utc::now(),
            HeartbeatRules::default()
        ));
    }

    #[test]
    fn test_heartbeat_updates_timestamp_and_merges_metadata() {
        let mut registry = Registry::new();
        let start = Utc::now();
        let mut metadata = Payload::new();
        metadata.insert("region".into(), serde_json::json!("eu"));
        let id = registry.register("a", "t", Vec::new(), "hero", metadata, start);

        let later = start + Duration::seconds(10);
        let mut update = Payload::new();
        update.insert("load".into(), serde_json::json!(0.4));
        assert!(registry.heartbeat(id, None, Some(update), later, HeartbeatRules::default()));

        let agent = registry.get(id).unwrap();
        assert_eq!(agent.last_heartbeat, later);
        assert_eq!(agent.metadata["region"], "eu");
        assert_eq!(agent.metadata["load"], 0.4);
    }

    #[test]
    fn test_sweep_marks_stale_offline_without_removing() {
        let mut registry = Registry::new();
        let start = Utc::now();
        let stale = register(&mut registry, "stale", &[], start);
        let fresh = register(&mut registry, "fresh", &[], start + Duration::minutes(4));

        let now = start + Duration::minutes(6);
        let offlined = registry.sweep_stale(now, Duration::minutes(5));
        assert_eq!(offlined, vec![stale]);
        assert_eq!(registry.get(stale).unwrap().status, AgentStatus::Offline);
        assert_eq!(registry.get(fresh).unwrap().status, AgentStatus::Idle);
        assert_eq!(registry.len(), 2);

        // Already offline agents are not reported twice.
        assert!(registry.sweep_stale(now, Duration::minutes(5)).is_empty());
    }

    #[test]
    fn test_sweep_boundary_is_exclusive() {
        let mut registry = Registry::new();
        let start = Utc::now();
        let id = register(&mut registry, "edge", &[], start);
        assert!(registry
            .sweep_stale(start + Duration::minutes(5), Duration::minutes(5))
            .is_empty());
        assert_eq!(registry.get(id).unwrap().status, AgentStatus::Idle);
    }

    #[test]
    fn test_bare_heartbeat_does_not_revive_by_default() {
        let mut registry = Registry::new();
        let start = Utc::now();
        let id = register(&mut registry, "a", &[], start);
        registry.sweep_stale(start + Duration::minutes(10), Duration::minutes(5));

        registry.heartbeat(
            id,
            None,
            None,
            start + Duration::minutes(11),
            HeartbeatRules::default(),
        );
        assert_eq!(registry.get(id).unwrap().status, AgentStatus::Offline);

        registry.heartbeat(
            id,
            Some(AgentStatus::Idle),
            None,
            start + Duration::minutes(12),
            HeartbeatRules::default(),
        );
        assert_eq!(registry.get(id).unwrap().status, AgentStatus::Idle);
    }

    #[test]
    fn test_bare_heartbeat_revives_when_enabled() {
        let mut registry = Registry::new();
        let start = Utc::now();
        let id = register(&mut registry, "a", &[], start);
        registry.sweep_stale(start + Duration::minutes(10), Duration::minutes(5));

        let rules = HeartbeatRules {
            revive: true,
            holds_assigned_task: false,
        };
        registry.heartbeat(id, None, None, start + Duration::minutes(11), rules);
        assert_eq!(registry.get(id).unwrap().status, AgentStatus::Idle);
    }

    #[test]
    fn test_idle_heartbeat_drops_held_task() {
        let mut registry = Registry::new();
        let start = Utc::now();
        let id = register(&mut registry, "a", &["x"], start);
        assert!(registry.assign(id, Uuid::new_v4()));
        registry.sweep_stale(start + Duration::minutes(10), Duration::minutes(5));
        assert_eq!(registry.get(id).unwrap().status, AgentStatus::Offline);

        let rules = HeartbeatRules {
            revive: false,
            holds_assigned_task: true,
        };
        registry.heartbeat(
            id,
            Some(AgentStatus::Idle),
            None,
            start + Duration::minutes(11),
            rules,
        );
        let agent = registry.get(id).unwrap();
        assert_eq!(agent.status, AgentStatus::Idle);
        assert!(agent.current_task.is_none());
    }

    #[test]
    fn test_offline_heartbeat_keeps_held_task() {
        let mut registry = Registry::new();
        let now = Utc::now();
        let id = register(&mut registry, "a", &["x"], now);
        let task = Uuid::new_v4();
        registry.assign(id, task);

        let rules = HeartbeatRules {
            revive: false,
            holds_assigned_task: true,
        };
        registry.heartbeat(id, Some(AgentStatus::Offline), None, now, rules);
        let agent = registry.get(id).unwrap();
        assert_eq!(agent.status, AgentStatus::Offline);
        assert_eq!(agent.current_task, Some(task));
    }

    #[test]
    fn test_busy_heartbeat_without_task_is_ignored() {
        let mut registry = Registry::new();
        let id = register(&mut registry, "a", &[], Utc::now());
        registry.heartbeat(
            id,
            Some(AgentStatus::Busy),
            None,
            Utc::now(),
            HeartbeatRules::default(),
        );
        assert_eq!(registry.get(id).unwrap().status, AgentStatus::Idle);
    }

    #[test]
    fn test_assign_and_release() {
        let mut registry = Registry::new();
        let id = register(&mut registry, "a", &["x"], Utc::now());
        let task = Uuid::new_v4();

        assert!(registry.assign(id, task));
        assert!(!registry.assign(id, Uuid::new_v4()), "busy agent cannot take a second task");
        let agent = registry.get(id).unwrap();
        assert_eq!(agent.status, AgentStatus::Busy);
        assert_eq!(agent.total_tasks, 1);

        assert!(registry.release(id, task, true));
        let agent = registry.get(id).unwrap();
        assert_eq!(agent.status, AgentStatus::Idle);
        assert!(agent.current_task.is_none());
        assert_eq!(agent.successful_tasks, 1);
        assert!((agent.performance_score - 1.01).abs() < 1e-12);
    }

    #[test]
    fn test_release_keeps_declared_offline() {
        let mut registry = Registry::new();
        let id = register(&mut registry, "a", &["x"], Utc::now());
        let task = Uuid::new_v4();
        registry.assign(id, task);
        let rules = HeartbeatRules {
            revive: false,
            holds_assigned_task: true,
        };
        registry.heartbeat(id, Some(AgentStatus::Offline), None, Utc::now(), rules);

        registry.release(id, task, false);
        let agent = registry.get(id).unwrap();
        assert_eq!(agent.status, AgentStatus::Offline);
        assert!(agent.current_task.is_none());
    }

    #[test]
    fn test_restore_clamps_score() {
        let mut registry = Registry::new();
        let mut agent = Agent::new("a", "t", Vec::new(), "hero", Utc::now());
        agent.performance_score = 9.0;
        let id = agent.id;
        registry.restore(agent);
        assert_eq!(registry.get(id).unwrap().performance_score, MAX_PERFORMANCE_SCORE);
    }

    #[test]
    fn test_counts_conserve_agents() {
        let mut registry = Registry::new();
        let start = Utc::now();
        register(&mut registry, "a", &[], start);
        let b = register(&mut registry, "b", &["x"], start);
        registry.assign(b, Uuid::new_v4());
        registry.register("c", "t", Vec::new(), "chimera", Payload::new(), start);

        let by_status = registry.status_counts();
        assert_eq!(by_status.values().sum::<usize>(), registry.len());
        assert_eq!(by_status[&AgentStatus::Busy], 1);
        assert_eq!(by_status[&AgentStatus::Idle], 2);
        assert_eq!(by_status[&AgentStatus::Error], 0);

        let by_framework = registry.framework_counts();
        assert_eq!(by_framework["hero"], 2);
        assert_eq!(by_framework["chimera"], 1);
    }
}
