//! Drives the bridge through its channel the way a transport would.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use hero_bridge::{Bridge, InboundMessage};
use hero_coordinator::{Coordinator, TaskStatus};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_run_loop_processes_until_closed() {
    let coordinator = Arc::new(Coordinator::builder().build().await.unwrap());
    let bridge = Arc::new(Bridge::new(coordinator.clone()));
    let (tx, handle) = bridge.clone().spawn(16);

    tx.send(InboundMessage::new(
        "chimera.v1.dev.hero.agents.orchestrator",
        serde_json::to_vec(&json!({
            "agent_name": "orchestrator",
            "capabilities": ["task_orchestration"]
        }))
        .unwrap(),
    ))
    .await
    .unwrap();
    tx.send(InboundMessage::new(
        "chi.v1.dev.hero.tasks.new",
        serde_json::to_vec(&json!({
            "task_name": "plan",
            "required_capabilities": ["task_orchestration"]
        }))
        .unwrap(),
    ))
    .await
    .unwrap();
    tx.send(InboundMessage::new("unrelated.subject", b"{}".to_vec()))
        .await
        .unwrap();
    tx.send(InboundMessage::new("hero.v1.status.x", b"oops".to_vec()))
        .await
        .unwrap();

    drop(tx);
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("bridge loop should stop once the channel closes")
        .unwrap();

    let status = bridge.status();
    assert_eq!(status.messages_processed, 2);
    assert_eq!(status.messages_ignored, 1);
    assert_eq!(status.error_count, 1);
    assert_eq!(status.agents_known, 1);

    let agents = coordinator.list_agents().await;
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0].framework, "chimera");

    let system = coordinator.get_system_status().await;
    assert_eq!(system.tasks.running, 1);
    assert_eq!(system.recent_activity[0].name, "plan");
    assert_eq!(system.recent_activity[0].status, TaskStatus::Assigned);
}
