//! Payload shapes accepted on each subject kind.
//!
//! Every field is optional on the wire; defaults mirror what publishers in
//! the field actually omit.

use hero_coordinator::{AgentStatus, Payload, TaskPriority};
use hero_core::{HeroError, HeroResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name given to tasks published without one.
pub const DEFAULT_TASK_NAME: &str = "chimera_task";

/// Announcement from an agent on an `agents` subject.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentMessage {
    /// Agent name; `unknown` when absent.
    #[serde(default = "unknown_agent")]
    pub agent_name: String,
    /// Type tag; `generic` when absent.
    #[serde(default = "generic_type")]
    pub agent_type: String,
    /// Declared capabilities.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Free text; only values naming a known status are applied.
    #[serde(default)]
    pub status: Option<String>,
    /// Metadata recorded at registration or merged on heartbeat.
    #[serde(default)]
    pub metadata: Option<Payload>,
}

fn unknown_agent() -> String {
    "unknown".to_string()
}

fn generic_type() -> String {
    "generic".to_string()
}

/// Task traffic on a `tasks` subject. A `task_id` marks a completion report.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskMessage {
    /// Task being reported on.
    #[serde(default)]
    pub task_id: Option<Uuid>,
    /// Task name; [`DEFAULT_TASK_NAME`] when absent.
    #[serde(default = "default_task_name")]
    pub task_name: String,
    /// Task description.
    #[serde(default)]
    pub description: String,
    /// Capabilities the task needs.
    #[serde(default)]
    pub required_capabilities: Vec<String>,
    /// Level name (`"high"`) or number (`3`).
    #[serde(default)]
    pub priority: Option<serde_json::Value>,
    /// Input payload for a new task.
    #[serde(default)]
    pub inputs: Option<Payload>,
    /// Outputs of a finished task.
    #[serde(default)]
    pub outputs: Option<Payload>,
    /// Error of a failed task.
    #[serde(default)]
    pub error: Option<String>,
}

fn default_task_name() -> String {
    DEFAULT_TASK_NAME.to_string()
}

impl TaskMessage {
    /// Requested priority, `normal` when absent.
    pub fn priority(&self) -> HeroResult<TaskPriority> {
        match &self.priority {
            None | Some(serde_json::Value::Null) => Ok(TaskPriority::Normal),
            Some(serde_json::Value::String(s)) => s.parse(),
            Some(serde_json::Value::Number(n)) => n.to_string().parse(),
            Some(other) => Err(HeroError::Validation(format!(
                "priority must be a name or number, got {other}"
            ))),
        }
    }
}

/// Liveness report on a `status` subject.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusMessage {
    /// Reporting agent; the message is rejected without one.
    pub agent_name: Option<String>,
    /// Free text; only values naming a known status are applied.
    #[serde(default)]
    pub status: Option<String>,
    /// Metadata merged into the agent record.
    #[serde(default)]
    pub metadata: Option<Payload>,
}

/// Parse a free-text status, dropping values the coordinator does not know.
pub fn known_status(raw: Option<&str>) -> Option<AgentStatus> {
    let raw = raw?;
    match raw.parse() {
        Ok(status) => Some(status),
        Err(_) => {
            tracing::debug!(status = %raw, "Ignoring unrecognised agent status");
            None
        }
    }
}

/// An agent registered at bridge start-up without waiting for traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownAgent {
    /// Agent name used to match later traffic.
    pub name: String,
    /// Type tag.
    pub agent_type: String,
    /// Declared capabilities.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl KnownAgent {
    fn new(name: &str, agent_type: &str, capabilities: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            agent_type: agent_type.to_string(),
            capabilities: capabilities.iter().map(|c| (*c).to_string()).collect(),
        }
    }
}

/// The Chimera agents every deployment runs.
pub fn default_known_agents() -> Vec<KnownAgent> {
    vec![
        KnownAgent::new(
            "chimera_embedder",
            "knowledge_processor",
            &["text_embedding", "vector_search", "semantic_analysis"],
        ),
        KnownAgent::new(
            "chimera_retriever",
            "knowledge_retriever",
            &["document_search", "context_retrieval", "relevance_ranking"],
        ),
        KnownAgent::new(
            "chimera_memory",
            "knowledge_manager",
            &["knowledge_storage", "memory_consolidation", "fact_extraction"],
        ),
        KnownAgent::new(
            "chimera_orchestrator",
            "workflow_coordinator",
            &["task_orchestration", "agent_coordination", "workflow_management"],
        ),
        KnownAgent::new(
            "chimera_ui_agent",
            "interface_agent",
            &["user_interaction", "visualization", "feedback_processing"],
        ),
    ]
}
