//! Best-effort notifications to an observability sidecar.
//!
//! Sinks are fire-and-forget: [`TraceSink::record`] is synchronous, never
//! fails and never waits on I/O. A coordinator built without a sink uses
//! [`NullTraceSink`].

use crate::types::TaskPriority;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

/// Coordination event forwarded to the sidecar.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    /// An agent joined the directory.
    AgentRegistered {
        /// Registered agent.
        agent_id: Uuid,
        /// Its name.
        agent_name: String,
        /// Its type tag.
        agent_type: String,
        /// Declared capabilities.
        capabilities: Vec<String>,
        /// Originating framework.
        framework: String,
    },
    /// The scheduler handed a task to an agent.
    TaskAssigned {
        /// Assigned task.
        task_id: Uuid,
        /// Its name.
        task_name: String,
        /// Its priority.
        priority: TaskPriority,
        /// Receiving agent.
        agent_id: Uuid,
        /// Its name.
        agent_name: String,
    },
    /// An assigned task finished.
    TaskCompleted {
        /// Finished task.
        task_id: Uuid,
        /// Its name.
        task_name: String,
        /// Agent that held it.
        agent_id: Option<Uuid>,
        /// `false` when an error was reported.
        success: bool,
        /// Seconds from assignment to completion.
        duration_secs: Option<f64>,
    },
}

/// One line of the JSON-lines trace file.
#[derive(Debug, Clone, Serialize)]
pub struct TraceRecord {
    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,
    /// Identifies the writing process.
    pub session_id: Uuid,
    /// The event itself, flattened into the record.
    #[serde(flatten)]
    pub event: TraceEvent,
}

/// Receiver of coordination events.
pub trait TraceSink: Send + Sync {
    /// Accept an event without blocking; delivery is best-effort.
    fn record(&self, event: TraceEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn record(&self, _event: TraceEvent) {}
}

/// Appends events to a JSON-lines file from a background task.
pub struct JsonlTraceSink {
    session_id: Uuid,
    tx: mpsc::UnboundedSender<TraceRecord>,
}

impl JsonlTraceSink {
    /// Spawn the writer task. Must be called inside a tokio runtime.
    pub fn new(path: PathBuf) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<TraceRecord>();

        tokio::spawn(async move {
            if let Some(dir) = path.parent() {
                let _ = tokio::fs::create_dir_all(dir).await;
            }
            let mut file = match tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Trace sink disabled: cannot open file");
                    // Drain so senders never notice.
                    while rx.recv().await.is_some() {}
                    return;
                }
            };

            while let Some(record) = rx.recv().await {
                let Ok(mut line) = serde_json::to_string(&record) else {
                    continue;
                };
                line.push('\n');
                let written = match file.write_all(line.as_bytes()).await {
                    Ok(()) => file.flush().await,
                    Err(e) => Err(e),
                };
                if let Err(e) = written {
                    warn!(error = %e, "Failed to append trace record");
                }
            }
        });

        Self {
            session_id: Uuid::new_v4(),
            tx,
        }
    }

    /// Identifier stamped on every record written by this sink.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }
}

impl TraceSink for JsonlTraceSink {
    fn record(&self, event: TraceEvent) {
        let _ = self.tx.send(TraceRecord {
            timestamp: Utc::now(),
            session_id: self.session_id,
            event,
        });
    }
}
