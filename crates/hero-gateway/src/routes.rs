//! Request handlers for the coordinator API.

use crate::error::ApiError;
use crate::server::GatewayState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use hero_bridge::InboundMessage;
use hero_coordinator::{AgentStatus, Payload, TaskPriority};
use hero_core::HeroError;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

type ApiResult<T> = Result<T, ApiError>;

/// Body of `POST /agents`.
#[derive(Debug, Deserialize)]
pub struct RegisterAgentRequest {
    /// Agent name.
    pub name: String,
    /// Type tag.
    pub agent_type: String,
    /// Declared capabilities.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Originating framework; `hero` when absent.
    #[serde(default = "default_framework")]
    pub framework: String,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Option<Payload>,
}

fn default_framework() -> String {
    "hero".to_string()
}

/// Body of `POST /agents/{id}/heartbeat`.
#[derive(Debug, Default, Deserialize)]
pub struct HeartbeatRequest {
    /// New status name; omitted for a bare heartbeat.
    #[serde(default)]
    pub status: Option<String>,
    /// Metadata merged into the agent record.
    #[serde(default)]
    pub metadata: Option<Payload>,
}

/// Body of `POST /tasks`.
#[derive(Debug, Deserialize)]
pub struct SubmitTaskRequest {
    /// Task name; must not be blank.
    pub name: String,
    /// Task description.
    #[serde(default)]
    pub description: String,
    /// Capabilities an agent must have.
    #[serde(default)]
    pub required_capabilities: Vec<String>,
    /// Level name or number; `normal` when absent.
    #[serde(default)]
    pub priority: Option<String>,
    /// Input payload.
    #[serde(default)]
    pub inputs: Option<Payload>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Option<Payload>,
}

/// Body of `POST /tasks/{id}/complete`.
#[derive(Debug, Default, Deserialize)]
pub struct CompleteTaskRequest {
    /// Task outputs.
    #[serde(default)]
    pub outputs: Option<Payload>,
    /// Error message; marks the task failed.
    #[serde(default)]
    pub error: Option<String>,
}

/// `GET /health`: liveness check, never behind auth.
pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok", "service": "hero"}))
}

/// `POST /agents`: register and return the new id.
pub async fn register_agent(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<RegisterAgentRequest>,
) -> impl IntoResponse {
    let agent_id = state
        .coordinator
        .register_agent(
            &req.name,
            &req.agent_type,
            req.capabilities,
            &req.framework,
            req.metadata,
        )
        .await;
    (StatusCode::CREATED, Json(json!({ "agent_id": agent_id })))
}

/// `GET /agents`: every agent in registration order.
pub async fn list_agents(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(state.coordinator.list_agents().await)
}

/// `GET /agents/{id}`.
pub async fn get_agent(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let agent = state
        .coordinator
        .get_agent(id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("agent {id}")))?;
    Ok(Json(agent))
}

/// `POST /agents/{id}/heartbeat`.
pub async fn heartbeat(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<HeartbeatRequest>,
) -> ApiResult<impl IntoResponse> {
    let status = req
        .status
        .as_deref()
        .map(str::parse::<AgentStatus>)
        .transpose()?;
    if !state.coordinator.agent_heartbeat(id, status, req.metadata).await {
        return Err(ApiError::not_found(format!("agent {id}")));
    }
    Ok(Json(json!({ "accepted": true })))
}

/// `POST /tasks`: queue a task and report whether it was assigned.
pub async fn submit_task(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<SubmitTaskRequest>,
) -> ApiResult<impl IntoResponse> {
    let priority = match req.priority.as_deref() {
        Some(raw) => raw.parse::<TaskPriority>()?,
        None => TaskPriority::default(),
    };
    let task_id = state
        .coordinator
        .submit_task(
            &req.name,
            &req.description,
            req.required_capabilities,
            priority,
            req.inputs,
            req.metadata,
        )
        .await?;
    let task = state.coordinator.get_task(task_id).await;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "task_id": task_id,
            "status": task.as_ref().map(|t| t.status),
            "assigned_agent": task.and_then(|t| t.assigned_agent),
        })),
    ))
}

/// `GET /tasks/{id}`.
pub async fn get_task(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let task = state
        .coordinator
        .get_task(id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("task {id}")))?;
    Ok(Json(task))
}

/// `POST /tasks/{id}/complete`: 404 unless the task is assigned.
pub async fn complete_task(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<CompleteTaskRequest>,
) -> ApiResult<impl IntoResponse> {
    if !state.coordinator.complete_task(id, req.outputs, req.error).await {
        return Err(ApiError::not_found(format!("assigned task {id}")));
    }
    Ok(Json(json!({ "completed": true })))
}

/// `GET /status`.
pub async fn system_status(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(state.coordinator.get_system_status().await)
}

/// `GET /bridge/status`: 503 when the bridge is disabled.
pub async fn bridge_status(State(state): State<Arc<GatewayState>>) -> ApiResult<impl IntoResponse> {
    let bridge = state.bridge.as_ref().ok_or_else(bridge_disabled)?;
    Ok(Json(bridge.bridge.status()))
}

/// Queue a raw pub/sub message for the bridge.
pub async fn publish(
    State(state): State<Arc<GatewayState>>,
    Path(subject): Path<String>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let bridge = state.bridge.as_ref().ok_or_else(bridge_disabled)?;
    bridge
        .sender
        .send(InboundMessage::new(subject, body.to_vec()))
        .await
        .map_err(|_| HeroError::Bridge("bridge is not running".to_string()))?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "queued": true }))))
}

fn bridge_disabled() -> ApiError {
    ApiError(HeroError::Bridge("bridge is disabled".to_string()))
}
