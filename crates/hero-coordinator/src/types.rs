use chrono::{DateTime, Utc};
use hero_core::HeroError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use uuid::Uuid;

/// Free-form JSON key/value payload used for inputs, outputs and metadata.
pub type Payload = HashMap<String, serde_json::Value>;

/// Lower bound of an agent's performance score.
pub const MIN_PERFORMANCE_SCORE: f64 = 0.1;
/// Upper bound of an agent's performance score.
pub const MAX_PERFORMANCE_SCORE: f64 = 2.0;
/// Score every agent starts with.
pub const INITIAL_PERFORMANCE_SCORE: f64 = 1.0;

/// Lifecycle state of a registered agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Registered but not yet accepting work.
    Starting,
    /// Available for assignment.
    Idle,
    /// Holding exactly one assigned task.
    Busy,
    /// Reported broken by the agent itself; never set by the coordinator.
    Error,
    /// Missed its heartbeat window or declared itself offline.
    Offline,
}

impl AgentStatus {
    /// Every status, in declaration order.
    pub const ALL: [AgentStatus; 5] = [
        AgentStatus::Starting,
        AgentStatus::Idle,
        AgentStatus::Busy,
        AgentStatus::Error,
        AgentStatus::Offline,
    ];

    /// Value substituted when a persisted status cannot be decoded.
    pub const FALLBACK: AgentStatus = AgentStatus::Offline;

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Starting => "starting",
            AgentStatus::Idle => "idle",
            AgentStatus::Busy => "busy",
            AgentStatus::Error => "error",
            AgentStatus::Offline => "offline",
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentStatus {
    type Err = HeroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| HeroError::Validation(format!("unknown agent status '{s}'")))
    }
}

/// Decode a persisted status, mapping anything unrecognised to [`AgentStatus::FALLBACK`].
pub(crate) fn status_or_fallback<'de, D>(deserializer: D) -> Result<AgentStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.parse().unwrap_or_else(|_| {
        tracing::warn!(status = %raw, fallback = %AgentStatus::FALLBACK, "Unrecognised persisted agent status");
        AgentStatus::FALLBACK
    }))
}

/// Task priority. Higher levels are scheduled first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Background work.
    Low,
    /// The default level.
    #[default]
    Normal,
    /// Ahead of normal work.
    High,
    /// Ahead of everything else.
    Urgent,
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskPriority::Low => "low",
            TaskPriority::Normal => "normal",
            TaskPriority::High => "high",
            TaskPriority::Urgent => "urgent",
        };
        f.write_str(name)
    }
}

impl FromStr for TaskPriority {
    type Err = HeroError;

    /// Accepts either the level name (`"high"`) or its number (`"3"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "1" => Ok(TaskPriority::Low),
            "normal" | "2" => Ok(TaskPriority::Normal),
            "high" | "3" => Ok(TaskPriority::High),
            "urgent" | "4" => Ok(TaskPriority::Urgent),
            other => Err(HeroError::Validation(format!("unknown task priority '{other}'"))),
        }
    }
}

/// Status of a task. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting in the queue for a capable idle agent.
    Pending,
    /// Handed to an agent and not yet reported back.
    Assigned,
    /// Finished without an error.
    Completed,
    /// Finished with an error message.
    Failed,
}

impl TaskStatus {
    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// A worker registered with the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Unique id assigned at registration.
    pub id: Uuid,
    /// Display name; not required to be unique.
    pub name: String,
    /// Free-form type tag.
    pub agent_type: String,
    /// Capability tags matched against task requirements.
    pub capabilities: BTreeSet<String>,
    /// Lifecycle state.
    #[serde(deserialize_with = "status_or_fallback")]
    pub status: AgentStatus,
    /// Time of the last heartbeat or registration.
    pub last_heartbeat: DateTime<Utc>,
    /// Set while the agent holds an assigned task.
    #[serde(default)]
    pub current_task: Option<Uuid>,
    /// Reliability score, always within `[0.1, 2.0]`.
    #[serde(default = "initial_score")]
    pub performance_score: f64,
    /// Tasks ever assigned to this agent.
    #[serde(default)]
    pub total_tasks: u64,
    /// Assigned tasks that completed without an error.
    #[serde(default)]
    pub successful_tasks: u64,
    /// Originating framework tag.
    #[serde(default = "unknown_framework")]
    pub framework: String,
    /// Secondary ordering key for scheduling ties.
    #[serde(default)]
    pub registered_at: DateTime<Utc>,
    /// Free-form metadata, merged by heartbeats.
    #[serde(default)]
    pub metadata: Payload,
}

fn initial_score() -> f64 {
    INITIAL_PERFORMANCE_SCORE
}

fn unknown_framework() -> String {
    "unknown".to_string()
}

impl Agent {
    /// A freshly registered agent in [`AgentStatus::Starting`].
    pub fn new(
        name: impl Into<String>,
        agent_type: impl Into<String>,
        capabilities: impl IntoIterator<Item = String>,
        framework: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            agent_type: agent_type.into(),
            capabilities: capabilities.into_iter().collect(),
            status: AgentStatus::Starting,
            last_heartbeat: now,
            current_task: None,
            performance_score: INITIAL_PERFORMANCE_SCORE,
            total_tasks: 0,
            successful_tasks: 0,
            framework: framework.into(),
            registered_at: now,
            metadata: Payload::new(),
        }
    }

    /// Share of assigned tasks that succeeded; 1.0 before the first assignment.
    pub fn success_rate(&self) -> f64 {
        if self.total_tasks == 0 {
            1.0
        } else {
            self.successful_tasks as f64 / self.total_tasks as f64
        }
    }

    /// Whether the agent provides every capability in `required`.
    pub fn can_handle(&self, required: &BTreeSet<String>) -> bool {
        required.is_subset(&self.capabilities)
    }

    /// Whether the scheduler may hand this agent a task.
    pub fn is_available(&self) -> bool {
        self.status == AgentStatus::Idle
    }
}

/// A unit of work waiting for, held by, or finished by an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique id assigned at submission.
    pub id: Uuid,
    /// Task name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Capabilities an agent must have to take the task.
    pub required_capabilities: BTreeSet<String>,
    /// Scheduling priority; fixed at submission.
    pub priority: TaskPriority,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// Agent holding or having finished the task.
    pub assigned_agent: Option<Uuid>,
    /// Lifecycle state.
    pub status: TaskStatus,
    /// Input payload supplied at submission.
    #[serde(default)]
    pub inputs: Payload,
    /// Output payload reported on completion.
    #[serde(default)]
    pub outputs: Payload,
    /// Error reported on failure.
    pub error: Option<String>,
    /// When the task was assigned.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task finished.
    pub completed_at: Option<DateTime<Utc>>,
    /// Free-form metadata supplied at submission.
    #[serde(default)]
    pub metadata: Payload,
}

impl Task {
    /// A pending task with empty inputs, outputs and metadata.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        required_capabilities: impl IntoIterator<Item = String>,
        priority: TaskPriority,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            required_capabilities: required_capabilities.into_iter().collect(),
            priority,
            created_at: now,
            assigned_agent: None,
            status: TaskStatus::Pending,
            inputs: Payload::new(),
            outputs: Payload::new(),
            error: None,
            started_at: None,
            completed_at: None,
            metadata: Payload::new(),
        }
    }

    /// Attach an input payload.
    pub fn with_inputs(mut self, inputs: Payload) -> Self {
        self.inputs = inputs;
        self
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: Payload) -> Self {
        self.metadata = metadata;
        self
    }

    /// Seconds between start and completion, when both are known.
    pub fn duration_secs(&self) -> Option<f64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => {
                let elapsed = end - start;
                Some(match elapsed.num_microseconds() {
                    Some(micros) => micros as f64 / 1_000_000.0,
                    None => elapsed.num_milliseconds() as f64 / 1000.0,
                })
            }
            _ => None,
        }
    }
}
