use crate::middleware::{auth_middleware, AuthConfig};
use crate::routes;
use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use hero_bridge::{Bridge, InboundMessage};
use hero_coordinator::Coordinator;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A running bridge and the channel that feeds it.
#[derive(Clone)]
pub struct BridgeHandle {
    /// Dispatcher, queried for its counters.
    pub bridge: Arc<Bridge>,
    /// Channel into the bridge run loop.
    pub sender: mpsc::Sender<InboundMessage>,
}

/// Shared application state.
pub struct GatewayState {
    /// Shared coordinator.
    pub coordinator: Arc<Coordinator>,
    /// Bridge, when enabled.
    pub bridge: Option<BridgeHandle>,
}

/// The HTTP gateway.
pub struct GatewayServer;

impl GatewayServer {
    /// Build the gateway without auth and without a bridge.
    pub fn build(coordinator: Arc<Coordinator>) -> Router {
        Self::build_with(coordinator, None, AuthConfig::default())
    }

    /// Build the gateway with an optional bridge and API-key auth.
    ///
    /// `/health` stays reachable without a key.
    pub fn build_with(
        coordinator: Arc<Coordinator>,
        bridge: Option<BridgeHandle>,
        auth: AuthConfig,
    ) -> Router {
        let state = Arc::new(GatewayState {
            coordinator,
            bridge,
        });

        let api = Router::new()
            .route("/agents", post(routes::register_agent).get(routes::list_agents))
            .route("/agents/{id}", get(routes::get_agent))
            .route("/agents/{id}/heartbeat", post(routes::heartbeat))
            .route("/tasks", post(routes::submit_task))
            .route("/tasks/{id}", get(routes::get_task))
            .route("/tasks/{id}/complete", post(routes::complete_task))
            .route("/status", get(routes::system_status))
            .route("/bridge/status", get(routes::bridge_status))
            .route("/publish/{subject}", post(routes::publish))
            .with_state(state);

        let api = if auth.is_enabled() {
            api.layer(axum_mw::from_fn_with_state(Arc::new(auth), auth_middleware))
        } else {
            api
        };

        Router::new().route("/health", get(routes::health)).merge(api)
    }
}
