//! Ingress adapter between a subject-based pub/sub bus and the coordinator.
//!
//! Subjects are classified by their tokens (`agents`, `tasks`, `status`) and
//! their JSON payloads are turned into register, heartbeat, submit and
//! complete calls. The transport itself is not part of this crate: anything
//! that can push `(subject, payload)` pairs into the bridge channel works,
//! including the gateway's publish endpoint.
//!
//! # Main types
//!
//! - [`Bridge`]: Dispatches messages and keeps integration counters.
//! - [`InboundMessage`]: One `(subject, payload)` pair from the transport.
//! - [`KnownAgent`]: Agent registered at start-up without waiting for traffic.

/// Message dispatch and the channel-driven run loop.
pub mod bridge;
/// Payload shapes per subject kind.
pub mod message;
/// Subject classification.
pub mod subject;

pub use bridge::{Bridge, BridgeOutcome, BridgeStatus, InboundMessage};
pub use message::{default_known_agents, KnownAgent, DEFAULT_TASK_NAME};
pub use subject::{Subject, SubjectKind};
