//! Agent registry, priority task queue and capability-matching scheduler.
//!
//! Agents register with a set of capability tags and report liveness through
//! heartbeats. Submitted tasks wait in a priority queue until the scheduler
//! hands them to the best idle agent that covers every required capability.
//! Completions feed a bounded reliability score per agent and session-wide
//! statistics. Every mutating call ends with an atomic snapshot and a
//! best-effort trace notification.
//!
//! # Main types
//!
//! - [`Coordinator`]: Facade owning all state behind a single lock.
//! - [`Registry`]: Directory of agents with heartbeat and staleness handling.
//! - [`TaskStore`]: Task records and the pending priority queue.
//! - [`SystemStatus`]: Structured report returned by status queries.
//! - [`SnapshotStore`]: Destination for atomic state snapshots.
//! - [`TraceSink`]: Receiver of register/assign/complete events.

/// Time source abstraction.
pub mod clock;
/// Coordinator tunables.
pub mod config;
/// Coordinator facade and builder.
pub mod coordinator;
mod instrument;
/// Background liveness sweeper.
pub mod liveness;
/// Reliability scoring and coordination statistics.
pub mod metrics;
/// Status reporting.
pub mod monitor;
/// Atomic snapshot persistence.
pub mod persistence;
/// Agent directory.
pub mod registry;
/// Greedy capability matching.
pub mod scheduler;
/// Task store and pending queue.
pub mod task_queue;
/// Observability sidecar sinks.
pub mod trace;
/// Agent, task and status types.
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CoordinatorConfig;
pub use coordinator::{Coordinator, CoordinatorBuilder};
pub use liveness::spawn_liveness_sweeper;
pub use metrics::CoordinationStats;
pub use monitor::{ActivityEntry, SystemStatus};
pub use persistence::{AgentDirectory, FileSnapshotStore, NullSnapshotStore, Snapshot, SnapshotStore};
pub use registry::Registry;
pub use task_queue::TaskStore;
pub use trace::{JsonlTraceSink, NullTraceSink, TraceEvent, TraceSink};
pub use types::{Agent, AgentStatus, Payload, Task, TaskPriority, TaskStatus};
