// tests/ingest_scheduler.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use terminator_webcams::config::PipelineConfig;
use terminator_webcams::geo::Location;
use terminator_webcams::ingest::scheduler::spawn_scheduler;
use terminator_webcams::ingest::types::{CameraDirectory, ExternalCameraRecord};
use terminator_webcams::ingest::Pipeline;
use terminator_webcams::store::MemoryStore;

#[derive(Default)]
struct Counting {
    calls: AtomicUsize,
}

#[async_trait]
impl CameraDirectory for Counting {
    async fn cameras_near(&self, _center: Location, _radius_deg: f64) -> Result<Vec<ExternalCameraRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![])
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

#[tokio::test(start_paused = true)]
async fn scheduler_runs_on_each_tick() {
    let mut cfg = PipelineConfig::default();
    cfg.geometry.precision_deg = 90.0;
    cfg.geometry.ring_offsets_deg = vec![0.0];
    cfg.fetch.batch_delay_ms = 0;
    cfg.fetch.stagger_ms = 0;

    let dir = Arc::new(Counting::default());
    let pipeline = Arc::new(Pipeline::new(dir.clone(), Arc::new(MemoryStore::new()), cfg));
    let handle = spawn_scheduler(pipeline, Duration::from_secs(60));

    // First tick fires immediately.
    tokio::time::sleep(Duration::from_secs(1)).await;
    let per_run = dir.calls.load(Ordering::SeqCst);
    assert!(per_run > 0);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(dir.calls.load(Ordering::SeqCst), 2 * per_run);

    handle.abort();
}
