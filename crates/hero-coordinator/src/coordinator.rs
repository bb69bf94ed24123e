//! The coordinator facade: one instance per process, shared by handle.
//!
//! All registry and task-store mutation happens under a single async mutex,
//! so a scheduling pass (find best agent, then assign) is never interleaved
//! with another. Each mutating call ends by copying a snapshot under the
//! lock; the copy is written and the trace events are emitted after the lock
//! is released.

use crate::clock::{Clock, SystemClock};
use crate::config::CoordinatorConfig;
use crate::instrument::observe;
use crate::metrics::CoordinationStats;
use crate::monitor::{build_status, SystemStatus};
use crate::persistence::{AgentDirectory, NullSnapshotStore, Snapshot, SnapshotStore};
use crate::registry::{HeartbeatRules, Registry};
use crate::scheduler::run_pass;
use crate::task_queue::TaskStore;
use crate::trace::{NullTraceSink, TraceEvent, TraceSink};
use crate::types::{Agent, AgentStatus, Payload, Task, TaskPriority};
use chrono::{DateTime, Utc};
use hero_core::{HeroError, HeroResult};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

struct CoordinatorState {
    registry: Registry,
    tasks: TaskStore,
    stats: CoordinationStats,
    generation: u64,
}

/// Work left over once the state lock is released.
#[derive(Default)]
struct Aftermath {
    events: Vec<TraceEvent>,
    snapshot: Option<Snapshot>,
}

/// Agent registry, task queue and scheduler behind one lock.
pub struct Coordinator {
    state: Mutex<CoordinatorState>,
    config: CoordinatorConfig,
    clock: Arc<dyn Clock>,
    store: Arc<dyn SnapshotStore>,
    tracer: Arc<dyn TraceSink>,
}

/// Assembles a [`Coordinator`] from optional collaborators.
///
/// Anything not supplied falls back to its null object: the system clock, a
/// snapshot store that keeps nothing and a trace sink that drops events.
pub struct CoordinatorBuilder {
    config: CoordinatorConfig,
    clock: Arc<dyn Clock>,
    store: Arc<dyn SnapshotStore>,
    tracer: Arc<dyn TraceSink>,
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self {
            config: CoordinatorConfig::default(),
            clock: Arc::new(SystemClock),
            store: Arc::new(NullSnapshotStore),
            tracer: Arc::new(NullTraceSink),
        }
    }
}

impl CoordinatorBuilder {
    /// Tunables; validated by [`CoordinatorBuilder::build`].
    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Time source for every timestamp the coordinator records.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Destination for the snapshot written after each mutation.
    pub fn snapshot_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = store;
        self
    }

    /// Receiver of register, assign and complete events.
    pub fn trace_sink(mut self, tracer: Arc<dyn TraceSink>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Validate the configuration and recover the persisted agent directory.
    ///
    /// A directory that cannot be read or has an unsupported version is
    /// logged and ignored; the coordinator then starts empty.
    pub async fn build(self) -> HeroResult<Coordinator> {
        self.config.validate()?;
        let now = self.clock.now();

        let mut registry = Registry::new();
        match self.store.load_directory().await {
            Ok(Some(directory)) => restore_directory(&mut registry, directory),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Ignoring persisted agent directory; starting empty"),
        }

        Ok(Coordinator {
            state: Mutex::new(CoordinatorState {
                registry,
                tasks: TaskStore::new(),
                stats: CoordinationStats::new(now),
                generation: 0,
            }),
            config: self.config,
            clock: self.clock,
            store: self.store,
            tracer: self.tracer,
        })
    }
}

fn restore_directory(registry: &mut Registry, directory: AgentDirectory) {
    let count = directory.agents.len();
    for (id, mut agent) in directory.agents {
        agent.id = id;
        registry.restore(agent);
    }
    info!(agents = count, last_updated = %directory.last_updated, "Restored agent directory");
}

impl Coordinator {
    /// Start assembling a coordinator.
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::default()
    }

    /// The validated configuration in use.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Add an agent to the directory. It becomes idle immediately and may
    /// pick up queued work in the same call.
    pub async fn register_agent(
        &self,
        name: &str,
        agent_type: &str,
        capabilities: Vec<String>,
        framework: &str,
        metadata: Option<Payload>,
    ) -> Uuid {
        observe("register_agent", async {
            let now = self.clock.now();
            let mut state = self.state.lock().await;
            let id = state.registry.register(
                name,
                agent_type,
                capabilities,
                framework,
                metadata.unwrap_or_default(),
                now,
            );
            let mut aftermath = Aftermath::default();
            if let Some(agent) = state.registry.get(id) {
                info!(agent_id = %id, name = %agent.name, framework = %agent.framework, "Agent registered");
                aftermath.events.push(TraceEvent::AgentRegistered {
                    agent_id: id,
                    agent_name: agent.name.clone(),
                    agent_type: agent.agent_type.clone(),
                    capabilities: agent.capabilities.iter().cloned().collect(),
                    framework: agent.framework.clone(),
                });
            }
            self.schedule(&mut state, now, &mut aftermath);
            aftermath.snapshot = Some(self.take_snapshot(&mut state, now));
            drop(state);

            self.settle(aftermath).await;
            id
        })
        .await
    }

    /// Queue a task and run a scheduling pass before returning.
    ///
    /// Fails with [`HeroError::Validation`] on an empty name or a blank
    /// capability, in which case nothing is recorded.
    pub async fn submit_task(
        &self,
        name: &str,
        description: &str,
        required_capabilities: Vec<String>,
        priority: TaskPriority,
        inputs: Option<Payload>,
        metadata: Option<Payload>,
    ) -> HeroResult<Uuid> {
        observe("submit_task", async {
            if name.trim().is_empty() {
                return Err(HeroError::Validation("task name must not be empty".to_string()));
            }
            if required_capabilities.iter().any(|c| c.trim().is_empty()) {
                return Err(HeroError::Validation(
                    "required capabilities must not be blank".to_string(),
                ));
            }

            let now = self.clock.now();
            let task = Task::new(name, description, required_capabilities, priority, now)
                .with_inputs(inputs.unwrap_or_default())
                .with_metadata(metadata.unwrap_or_default());

            let mut state = self.state.lock().await;
            let id = state.tasks.submit(task);
            info!(task_id = %id, name = %name, priority = %priority, "Task submitted");

            let mut aftermath = Aftermath::default();
            self.schedule(&mut state, now, &mut aftermath);
            aftermath.snapshot = Some(self.take_snapshot(&mut state, now));
            drop(state);

            self.settle(aftermath).await;
            Ok(id)
        })
        .await
    }

    /// Close an assigned task and free its agent.
    ///
    /// Returns `false`, changing nothing, when the task is unknown or not
    /// currently assigned.
    pub async fn complete_task(
        &self,
        task_id: Uuid,
        outputs: Option<Payload>,
        error: Option<String>,
    ) -> bool {
        observe("complete_task", async {
            let now = self.clock.now();
            let mut state = self.state.lock().await;
            let success = error.is_none();

            let Some(task) = state
                .tasks
                .finish(task_id, outputs.unwrap_or_default(), error, now)
            else {
                warn!(task_id = %task_id, "Cannot complete unknown or unassigned task");
                return false;
            };
            let agent_id = task.assigned_agent;
            let event = TraceEvent::TaskCompleted {
                task_id,
                task_name: task.name.clone(),
                agent_id,
                success,
                duration_secs: task.duration_secs(),
            };

            if let Some(agent_id) = agent_id {
                state.registry.release(agent_id, task_id, success);
            }
            let state_ref = &mut *state;
            state_ref.stats.total_tasks_processed += 1;
            state_ref.stats.recompute(&state_ref.registry, &state_ref.tasks);
            info!(task_id = %task_id, success, "Task completed");

            let mut aftermath = Aftermath {
                events: vec![event],
                snapshot: None,
            };
            self.schedule(&mut state, now, &mut aftermath);
            aftermath.snapshot = Some(self.take_snapshot(&mut state, now));
            drop(state);

            self.settle(aftermath).await;
            true
        })
        .await
    }

    /// Record a liveness signal. Returns `false` for an unknown agent.
    ///
    /// An agent that reports `idle` or `starting` while still holding an
    /// assigned task has abandoned it: the task goes back to the queue and
    /// may be handed out again in the same call.
    pub async fn agent_heartbeat(
        &self,
        agent_id: Uuid,
        status: Option<AgentStatus>,
        metadata: Option<Payload>,
    ) -> bool {
        observe("agent_heartbeat", async {
            let now = self.clock.now();
            let mut state = self.state.lock().await;

            let held_task = state
                .registry
                .get(agent_id)
                .and_then(|a| a.current_task)
                .filter(|task| state.tasks.is_assigned(*task));
            let rules = HeartbeatRules {
                revive: self.config.revive_on_heartbeat,
                holds_assigned_task: held_task.is_some(),
            };
            if !state.registry.heartbeat(agent_id, status, metadata, now, rules) {
                warn!(agent_id = %agent_id, "Heartbeat from unknown agent");
                return false;
            }

            let dropped = held_task.filter(|_| {
                state
                    .registry
                    .get(agent_id)
                    .is_some_and(|a| a.current_task.is_none())
            });
            if let Some(task_id) = dropped {
                if state.tasks.requeue(task_id) {
                    info!(task_id = %task_id, agent_id = %agent_id, "Task returned to queue by its agent");
                }
            }

            let mut aftermath = Aftermath::default();
            self.schedule(&mut state, now, &mut aftermath);
            aftermath.snapshot = Some(self.take_snapshot(&mut state, now));
            drop(state);

            self.settle(aftermath).await;
            true
        })
        .await
    }

    /// Sweep stale agents, then report the current state.
    pub async fn get_system_status(&self) -> SystemStatus {
        observe("get_system_status", async {
            let now = self.clock.now();
            let mut state = self.state.lock().await;
            let swept = state
                .registry
                .sweep_stale(now, self.config.heartbeat_timeout());
            let status = self.current_status(&mut state, now);

            let mut aftermath = Aftermath::default();
            if !swept.is_empty() {
                aftermath.snapshot = Some(self.take_snapshot(&mut state, now));
            }
            drop(state);

            self.settle(aftermath).await;
            status
        })
        .await
    }

    /// Mark agents past their heartbeat timeout offline. Returns the ids
    /// that changed.
    pub async fn sweep_stale(&self) -> Vec<Uuid> {
        observe("sweep_stale", async {
            let now = self.clock.now();
            let mut state = self.state.lock().await;
            let swept = state
                .registry
                .sweep_stale(now, self.config.heartbeat_timeout());

            let mut aftermath = Aftermath::default();
            if !swept.is_empty() {
                info!(count = swept.len(), "Agents marked offline");
                aftermath.snapshot = Some(self.take_snapshot(&mut state, now));
            }
            drop(state);

            self.settle(aftermath).await;
            swept
        })
        .await
    }

    /// Write a snapshot of the current state regardless of changes.
    pub async fn persist(&self) -> HeroResult<()> {
        let now = self.clock.now();
        let snapshot = {
            let mut state = self.state.lock().await;
            self.take_snapshot(&mut state, now)
        };
        self.store.save(&snapshot).await
    }

    /// Copy of an agent record.
    pub async fn get_agent(&self, id: Uuid) -> Option<Agent> {
        self.state.lock().await.registry.get(id).cloned()
    }

    /// Copy of a task record.
    pub async fn get_task(&self, id: Uuid) -> Option<Task> {
        self.state.lock().await.tasks.get(id).cloned()
    }

    /// Every agent, in registration order.
    pub async fn list_agents(&self) -> Vec<Agent> {
        let state = self.state.lock().await;
        state.registry.ordered().into_iter().cloned().collect()
    }

    /// Agent id by exact name, first registered wins.
    pub async fn find_agent_by_name(&self, name: &str) -> Option<Uuid> {
        let state = self.state.lock().await;
        state
            .registry
            .ordered()
            .into_iter()
            .find(|a| a.name == name)
            .map(|a| a.id)
    }

    /// Sweep, then assign whatever queued work the idle agents can take.
    fn schedule(&self, state: &mut CoordinatorState, now: DateTime<Utc>, aftermath: &mut Aftermath) {
        state
            .registry
            .sweep_stale(now, self.config.heartbeat_timeout());
        for assignment in run_pass(&mut state.registry, &mut state.tasks, now) {
            let (Some(task), Some(agent)) = (
                state.tasks.get(assignment.task_id),
                state.registry.get(assignment.agent_id),
            ) else {
                continue;
            };
            info!(task_id = %task.id, agent_id = %agent.id, agent = %agent.name, "Task assigned");
            aftermath.events.push(TraceEvent::TaskAssigned {
                task_id: task.id,
                task_name: task.name.clone(),
                priority: task.priority,
                agent_id: agent.id,
                agent_name: agent.name.clone(),
            });
        }
    }

    fn current_status(&self, state: &mut CoordinatorState, now: DateTime<Utc>) -> SystemStatus {
        let status = build_status(
            &state.registry,
            &state.tasks,
            &state.stats,
            now,
            self.config.activity_window(),
        );
        state.stats.active_agents = status.agents.active;
        status
    }

    fn take_snapshot(&self, state: &mut CoordinatorState, now: DateTime<Utc>) -> Snapshot {
        state.generation += 1;
        let status = self.current_status(state, now);
        Snapshot {
            generation: state.generation,
            status,
            directory: AgentDirectory::from_registry(&state.registry, now),
        }
    }

    /// Emit trace events and write the snapshot. Never fails.
    async fn settle(&self, aftermath: Aftermath) {
        for event in aftermath.events {
            self.tracer.record(event);
        }
        if let Some(snapshot) = aftermath.snapshot {
            if let Err(e) = self.store.save(&snapshot).await {
                warn!(generation = snapshot.generation, error = %e, "Failed to persist coordinator snapshot");
            }
        }
    }
}
