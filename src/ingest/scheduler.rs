// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::ingest::{Pipeline, RunError};

/// Spawn an in-process trigger that runs the pipeline every `interval`.
/// A tick that lands while a run is still going is skipped, not queued.
pub fn spawn_scheduler(pipeline: Arc<Pipeline>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match pipeline.try_run(chrono::Utc::now()).await {
                Ok(summary) => tracing::info!(
                    target: "scheduler",
                    sunrise = summary.sunrise,
                    sunset = summary.sunset,
                    "scheduled run finished"
                ),
                Err(RunError::Busy) => {}
                Err(e) => tracing::error!(target: "scheduler", error = %e, "scheduled run failed"),
            }
        }
    })
}
