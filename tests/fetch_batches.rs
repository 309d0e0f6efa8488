// tests/fetch_batches.rs
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use terminator_webcams::geo::Location;
use terminator_webcams::ingest::fetch::{fetch_in_batches, FetchParams};
use terminator_webcams::ingest::types::{CameraDirectory, ExternalCameraRecord};
use tokio::time::Instant;

/// Records when each query started (ms since creation) and answers from a
/// closure.
struct RecordingDirectory<F> {
    start: Instant,
    calls: Mutex<Vec<(Location, u128)>>,
    answer: F,
}

impl<F> RecordingDirectory<F>
where
    F: Fn(Location) -> Result<Vec<ExternalCameraRecord>> + Send + Sync,
{
    fn new(answer: F) -> Self {
        Self {
            start: Instant::now(),
            calls: Mutex::new(Vec::new()),
            answer,
        }
    }

    fn call_times(&self) -> Vec<u128> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

#[async_trait]
impl<F> CameraDirectory for RecordingDirectory<F>
where
    F: Fn(Location) -> Result<Vec<ExternalCameraRecord>> + Send + Sync,
{
    async fn cameras_near(&self, center: Location, _radius_deg: f64) -> Result<Vec<ExternalCameraRecord>> {
        let t = self.start.elapsed().as_millis();
        self.calls.lock().unwrap().push((center, t));
        (self.answer)(center)
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

fn coords(n: usize) -> Vec<Location> {
    (0..n).map(|i| Location::new(0.0, i as f64 * 10.0)).collect()
}

fn params(batch_size: usize) -> FetchParams {
    FetchParams {
        radius_deg: 9.0,
        batch_size,
        batch_delay: Duration::from_millis(1000),
        stagger: Duration::from_millis(100),
    }
}

#[tokio::test(start_paused = true)]
async fn queries_are_staggered_within_and_delayed_between_batches() {
    let dir = Arc::new(RecordingDirectory::new(|_| Ok(vec![])));
    let report = fetch_in_batches(dir.clone(), &coords(5), &params(2)).await;

    assert_eq!(report.points_queried, 5);
    assert_eq!(report.points_failed, 0);

    let mut times = dir.call_times();
    times.sort_unstable();
    assert_eq!(times, vec![0, 100, 1100, 1200, 2200]);
}

#[tokio::test(start_paused = true)]
async fn single_batch_has_no_inter_batch_delay() {
    let dir = Arc::new(RecordingDirectory::new(|_| Ok(vec![])));
    fetch_in_batches(dir.clone(), &coords(3), &params(5)).await;

    let mut times = dir.call_times();
    times.sort_unstable();
    assert_eq!(times, vec![0, 100, 200]);
}

#[tokio::test(start_paused = true)]
async fn failing_point_counts_as_empty() {
    let dir = Arc::new(RecordingDirectory::new(|c: Location| {
        if c.lng == 10.0 {
            Err(anyhow!("HTTP 500"))
        } else {
            Ok(vec![ExternalCameraRecord::new(
                format!("cam-{}", c.lng),
                c.lat + 1.0,
                c.lng,
            )])
        }
    }));
    let report = fetch_in_batches(dir.clone(), &coords(3), &params(5)).await;

    assert_eq!(report.points_failed, 1);
    let ids: Vec<&str> = report.cameras.iter().map(|c| c.external_id.as_str()).collect();
    assert_eq!(ids, vec!["cam-0", "cam-20"]);
}

#[tokio::test(start_paused = true)]
async fn overlapping_results_merge_by_id_last_write_wins() {
    let dir = Arc::new(RecordingDirectory::new(|c: Location| {
        let mut shared = ExternalCameraRecord::new("shared", 1.0, 5.0);
        shared.title = Some(format!("seen from {}", c.lng));
        let own = ExternalCameraRecord::new(format!("own-{}", c.lng), 2.0, c.lng);
        Ok(vec![own, shared])
    }));
    let report = fetch_in_batches(dir.clone(), &coords(4), &params(2)).await;

    assert_eq!(report.cameras.len(), 5);
    let shared = report
        .cameras
        .iter()
        .find(|c| c.external_id == "shared")
        .unwrap();
    assert_eq!(shared.title.as_deref(), Some("seen from 30"));

    // Output is ordered by external id.
    let ids: Vec<&str> = report.cameras.iter().map(|c| c.external_id.as_str()).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);
}

#[tokio::test(start_paused = true)]
async fn no_coordinates_no_queries() {
    let dir = Arc::new(RecordingDirectory::new(|_| Ok(vec![])));
    let report = fetch_in_batches(dir.clone(), &[], &params(5)).await;
    assert!(report.cameras.is_empty());
    assert!(dir.call_times().is_empty());
}
