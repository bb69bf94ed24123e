use crate::coordinator::Coordinator;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Start a background loop that sweeps stale agents every `interval`.
///
/// Status reads still sweep on their own; this only shortens how long a dead
/// agent stays idle between reads. Returns the handle so the caller can
/// abort it.
pub fn spawn_liveness_sweeper(coordinator: Arc<Coordinator>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            timer.tick().await;
            let swept = coordinator.sweep_stale().await;
            if !swept.is_empty() {
                tracing::debug!(count = swept.len(), "Liveness sweep marked agents offline");
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::types::AgentStatus;

    #[tokio::test]
    async fn test_sweeper_marks_stale_agents() {
        let clock = Arc::new(ManualClock::default());
        let coord = Arc::new(
            Coordinator::builder()
                .clock(clock.clone())
                .build()
                .await
                .unwrap(),
        );
        let id = coord
            .register_agent("quiet", "generic", Vec::new(), "hero", None)
            .await;
        clock.advance(chrono::Duration::minutes(10));

        let handle = spawn_liveness_sweeper(coord.clone(), Duration::from_millis(10));
        let mut status = AgentStatus::Idle;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            status = coord.get_agent(id).await.unwrap().status;
            if status == AgentStatus::Offline {
                break;
            }
        }
        handle.abort();
        assert_eq!(status, AgentStatus::Offline);
    }
}
