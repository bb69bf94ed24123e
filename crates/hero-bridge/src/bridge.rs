use crate::message::{known_status, AgentMessage, KnownAgent, StatusMessage, TaskMessage};
use crate::subject::{Subject, SubjectKind};
use chrono::{DateTime, Utc};
use hero_coordinator::{Coordinator, Payload};
use hero_core::{HeroError, HeroResult};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One message as delivered by the pub/sub transport.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Dot-separated subject.
    pub subject: String,
    /// Raw JSON body.
    pub payload: Vec<u8>,
}

impl InboundMessage {
    /// Pair a subject with its payload.
    pub fn new(subject: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            subject: subject.into(),
            payload: payload.into(),
        }
    }
}

/// What the bridge did with a message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BridgeOutcome {
    /// First sighting of an agent name; it was registered.
    Registered {
        /// New coordinator id.
        agent_id: Uuid,
    },
    /// Known agent; the message became a heartbeat.
    Heartbeat {
        /// Agent the heartbeat was applied to.
        agent_id: Uuid,
        /// `false` when the coordinator no longer knows the agent.
        accepted: bool,
    },
    /// A new task was queued.
    Submitted {
        /// Id of the queued task.
        task_id: Uuid,
    },
    /// A completion report was forwarded.
    Completed {
        /// Task named by the report.
        task_id: Uuid,
        /// `false` when the task was unknown or not assigned.
        accepted: bool,
    },
    /// The subject names no kind the bridge handles.
    Ignored,
}

/// Integration counters reported alongside coordinator status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BridgeStatus {
    /// Messages dispatched to the coordinator.
    pub messages_processed: u64,
    /// Messages whose subject matched no handled kind.
    pub messages_ignored: u64,
    /// Messages that failed to decode or dispatch.
    pub error_count: u64,
    /// When the last message arrived.
    pub last_activity: Option<DateTime<Utc>>,
    /// Agent names the bridge has mapped to ids.
    pub agents_known: usize,
}

/// Translates pub/sub traffic into coordinator calls.
pub struct Bridge {
    coordinator: Arc<Coordinator>,
    /// Agent name to coordinator id. Held across registration so the same
    /// name is never registered twice.
    agents: Mutex<HashMap<String, Uuid>>,
    status: parking_lot::Mutex<BridgeStatus>,
}

impl Bridge {
    /// Bridge feeding `coordinator`.
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self {
            coordinator,
            agents: Mutex::new(HashMap::new()),
            status: parking_lot::Mutex::new(BridgeStatus::default()),
        }
    }

    /// Copy of the integration counters.
    pub fn status(&self) -> BridgeStatus {
        self.status.lock().clone()
    }

    /// Register agents that are expected to exist before they publish anything.
    ///
    /// Names already known to the bridge or the coordinator are reused.
    pub async fn bootstrap(&self, known: &[KnownAgent]) -> Vec<Uuid> {
        let mut ids = Vec::with_capacity(known.len());
        let mut agents = self.agents.lock().await;
        for agent in known {
            if let Some(id) = agents.get(&agent.name) {
                ids.push(*id);
                continue;
            }
            let id = match self.coordinator.find_agent_by_name(&agent.name).await {
                Some(id) => id,
                None => {
                    let mut metadata = Payload::new();
                    metadata.insert("auto_discovered".into(), serde_json::Value::Bool(true));
                    metadata.insert("source".into(), serde_json::json!("hero_bridge"));
                    self.coordinator
                        .register_agent(
                            &agent.name,
                            &agent.agent_type,
                            agent.capabilities.clone(),
                            "chimera",
                            Some(metadata),
                        )
                        .await
                }
            };
            agents.insert(agent.name.clone(), id);
            ids.push(id);
        }
        self.status.lock().agents_known = agents.len();
        info!(count = ids.len(), "Bootstrapped known agents");
        ids
    }

    /// Decode and dispatch one message, updating the integration counters.
    pub async fn handle(&self, subject: &str, payload: &[u8]) -> HeroResult<BridgeOutcome> {
        let subject = Subject::parse(subject);
        let result = self.dispatch(&subject, payload).await;

        let mut status = self.status.lock();
        status.last_activity = Some(Utc::now());
        match &result {
            Ok(BridgeOutcome::Ignored) => status.messages_ignored += 1,
            Ok(_) => status.messages_processed += 1,
            Err(e) => {
                status.error_count += 1;
                warn!(subject = %subject.raw, error = %e, "Bridge message rejected");
            }
        }
        result
    }

    async fn dispatch(&self, subject: &Subject<'_>, payload: &[u8]) -> HeroResult<BridgeOutcome> {
        let Some(kind) = subject.kind else {
            debug!(subject = %subject.raw, "Ignoring message on unrelated subject");
            return Ok(BridgeOutcome::Ignored);
        };
        match kind {
            SubjectKind::Agent => {
                let message: AgentMessage = serde_json::from_slice(payload)?;
                self.on_agent(subject, message).await
            }
            SubjectKind::Task => {
                let message: TaskMessage = serde_json::from_slice(payload)?;
                self.on_task(subject, message).await
            }
            SubjectKind::Status => {
                let message: StatusMessage = serde_json::from_slice(payload)?;
                self.on_status(message).await
            }
        }
    }

    async fn on_agent(&self, subject: &Subject<'_>, message: AgentMessage) -> HeroResult<BridgeOutcome> {
        let status = known_status(message.status.as_deref());
        let mut agents = self.agents.lock().await;

        let existing = match agents.get(&message.agent_name) {
            Some(id) => Some(*id),
            None => self.coordinator.find_agent_by_name(&message.agent_name).await,
        };
        if let Some(agent_id) = existing {
            agents.insert(message.agent_name, agent_id);
            drop(agents);
            let accepted = self
                .coordinator
                .agent_heartbeat(agent_id, status, message.metadata)
                .await;
            return Ok(BridgeOutcome::Heartbeat { agent_id, accepted });
        }

        let mut metadata = message.metadata.unwrap_or_default();
        metadata.insert("subject".into(), serde_json::json!(subject.raw));
        let agent_id = self
            .coordinator
            .register_agent(
                &message.agent_name,
                &message.agent_type,
                message.capabilities,
                subject.source,
                Some(metadata),
            )
            .await;
        agents.insert(message.agent_name, agent_id);
        self.status.lock().agents_known = agents.len();
        Ok(BridgeOutcome::Registered { agent_id })
    }

    async fn on_task(&self, subject: &Subject<'_>, message: TaskMessage) -> HeroResult<BridgeOutcome> {
        if let Some(task_id) = message.task_id {
            let accepted = self
                .coordinator
                .complete_task(task_id, message.outputs, message.error)
                .await;
            return Ok(BridgeOutcome::Completed { task_id, accepted });
        }

        let priority = message.priority()?;
        let mut metadata = Payload::new();
        metadata.insert("source".into(), serde_json::json!(subject.source));
        metadata.insert("subject".into(), serde_json::json!(subject.raw));
        let task_id = self
            .coordinator
            .submit_task(
                &message.task_name,
                &message.description,
                message.required_capabilities,
                priority,
                message.inputs,
                Some(metadata),
            )
            .await?;
        Ok(BridgeOutcome::Submitted { task_id })
    }

    async fn on_status(&self, message: StatusMessage) -> HeroResult<BridgeOutcome> {
        let name = message
            .agent_name
            .ok_or_else(|| HeroError::Validation("status message without agent_name".into()))?;

        let known = self.agents.lock().await.get(&name).copied();
        let agent_id = match known {
            Some(id) => id,
            None => self
                .coordinator
                .find_agent_by_name(&name)
                .await
                .ok_or_else(|| HeroError::Bridge(format!("status for unknown agent '{name}'")))?,
        };

        let accepted = self
            .coordinator
            .agent_heartbeat(agent_id, known_status(message.status.as_deref()), message.metadata)
            .await;
        Ok(BridgeOutcome::Heartbeat { agent_id, accepted })
    }

    /// Consume messages until every sender is dropped.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<InboundMessage>) {
        info!("Bridge listening for messages");
        while let Some(message) = rx.recv().await {
            // Failures are already counted and logged by `handle`.
            let _ = self.handle(&message.subject, &message.payload).await;
        }
        info!("Bridge channel closed");
    }

    /// Spawn [`Bridge::run`] and return the sending half of its channel.
    pub fn spawn(self: Arc<Self>, capacity: usize) -> (mpsc::Sender<InboundMessage>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity);
        let handle = tokio::spawn(self.run(rx));
        (tx, handle)
    }
}
