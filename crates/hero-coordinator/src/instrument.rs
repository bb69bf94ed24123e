//! Boundary instrumentation shared by every public coordinator operation.

use crate::monitor::SystemStatus;
use hero_core::HeroResult;
use std::future::Future;
use std::time::Instant;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

/// Short description of an operation's result for the completion event.
pub(crate) trait Outcome {
    fn describe(&self) -> String;
}

impl Outcome for bool {
    fn describe(&self) -> String {
        if *self { "ok" } else { "rejected" }.to_string()
    }
}

impl Outcome for Uuid {
    fn describe(&self) -> String {
        self.to_string()
    }
}

impl Outcome for SystemStatus {
    fn describe(&self) -> String {
        format!(
            "{} agents, {} queued",
            self.agents.total, self.tasks.queue_length
        )
    }
}

impl Outcome for Vec<Uuid> {
    fn describe(&self) -> String {
        format!("{} changed", self.len())
    }
}

impl<T: Outcome> Outcome for HeroResult<T> {
    fn describe(&self) -> String {
        match self {
            Ok(value) => value.describe(),
            Err(e) => format!("error: {e}"),
        }
    }
}

/// Run `fut` inside a span named after `operation` and log how it went.
pub(crate) async fn observe<F>(operation: &'static str, fut: F) -> F::Output
where
    F: Future,
    F::Output: Outcome,
{
    let span = info_span!("coordinator", operation);
    async move {
        let started = Instant::now();
        let output = fut.await;
        debug!(
            elapsed_us = started.elapsed().as_micros() as u64,
            outcome = %output.describe(),
            "Operation finished"
        );
        output
    }
    .instrument(span)
    .await
}
