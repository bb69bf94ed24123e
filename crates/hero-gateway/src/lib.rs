//! HTTP gateway for the Hero coordinator.
//!
//! Exposes registration, heartbeats, task submission and completion, status
//! queries and a publish endpoint that feeds the pub/sub bridge. Optional
//! API-key auth guards everything except `/health`.

/// Error-to-response mapping.
pub mod error;
/// API-key auth middleware.
pub mod middleware;
/// Request handlers.
pub mod routes;
/// Router assembly and shared state.
pub mod server;

pub use error::ApiError;
pub use middleware::AuthConfig;
pub use server::{BridgeHandle, GatewayServer, GatewayState};
