// src/ingest/mod.rs
//! One pipeline run: geometry → sample points → directory queries →
//! classification → reconciliation.

pub mod fetch;
pub mod providers;
pub mod scheduler;
pub mod types;

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::classify::classify;
use crate::config::{GeometryConfig, PipelineConfig};
use crate::geo::ring::shifted_terminator_ring;
use crate::geo::{dedupe_coords, sample_arc, split_arcs, subsolar_point, Location, SubsolarPoint};
use crate::ingest::fetch::fetch_in_batches;
use crate::ingest::types::CameraDirectory;
use crate::store::{reconcile, StoreError, WebcamStore};

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_runs_total", "Pipeline runs started.");
        describe_counter!("ingest_queries_total", "Directory queries issued.");
        describe_counter!(
            "ingest_query_errors_total",
            "Directory queries that failed and were treated as empty."
        );
        describe_counter!(
            "ingest_malformed_records_total",
            "Directory entries skipped because they did not parse."
        );
        describe_counter!("ingest_cameras_total", "Cameras classified, by phase.");
        describe_counter!("reconcile_upserts_total", "Webcam upserts attempted.");
        describe_counter!(
            "reconcile_upsert_failures_total",
            "Webcam upserts rejected by the store or skipped as malformed."
        );
        describe_counter!(
            "reconcile_deactivated_total",
            "Terminator state rows deactivated."
        );
        describe_gauge!("ingest_sample_points", "Sample points in the last run.");
        describe_histogram!("ingest_parse_ms", "Directory parse time in milliseconds.");
        describe_histogram!("ingest_run_duration_ms", "Whole-run wall time in milliseconds.");
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix ts when ingest pipeline last ran."
        );
    });
}

/// Query coordinates for one instant, split by the arc they came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplePlan {
    pub subsolar: SubsolarPoint,
    pub sunrise: Vec<Location>,
    pub sunset: Vec<Location>,
}

impl SamplePlan {
    /// Deduplicated union of both sides, sunrise first.
    pub fn query_points(&self) -> Vec<Location> {
        dedupe_coords(self.sunrise.iter().chain(self.sunset.iter()).copied())
    }
}

/// Build every configured ring (main plus west-shifted ones), split each by
/// phase and collect the per-phase samples.
pub fn plan_samples(geometry: &GeometryConfig, at: DateTime<Utc>) -> SamplePlan {
    let subsolar = subsolar_point(at);
    let mut sunrise = Vec::new();
    let mut sunset = Vec::new();

    for &offset in &geometry.ring_offsets_deg {
        let ring = shifted_terminator_ring(
            &subsolar,
            geometry.precision_deg,
            geometry.sun_altitude_deg,
            offset,
        );
        let arcs = split_arcs(&ring, &subsolar);
        sunrise.extend(sample_arc(&arcs.sunrise.points, geometry.sample_midpoints));
        sunset.extend(sample_arc(&arcs.sunset.points, geometry.sample_midpoints));
    }

    SamplePlan {
        subsolar,
        sunrise: dedupe_coords(sunrise),
        sunset: dedupe_coords(sunset),
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub ok: bool,
    pub sunrise: usize,
    pub sunset: usize,
    pub cameras: usize,
    pub sample_points: usize,
    pub queries_failed: usize,
    pub upserts_attempted: usize,
    pub upserts_failed: usize,
    pub states_written: usize,
    pub deactivated: u64,
}

/// Run the pipeline once at `now`. Directory failures degrade to fewer
/// cameras; only a store that cannot be reached fails the run.
pub async fn run_once(
    directory: Arc<dyn CameraDirectory>,
    store: Arc<dyn WebcamStore>,
    cfg: &PipelineConfig,
    now: DateTime<Utc>,
) -> Result<RunSummary, StoreError> {
    ensure_metrics_described();
    let t0 = Instant::now();
    counter!("ingest_runs_total").increment(1);

    let plan = plan_samples(&cfg.geometry, now);
    let points = plan.query_points();
    gauge!("ingest_sample_points").set(points.len() as f64);
    tracing::info!(
        target: "ingest",
        subsolar_lat = plan.subsolar.lat,
        subsolar_lng = plan.subsolar.lng,
        sunrise_samples = plan.sunrise.len(),
        sunset_samples = plan.sunset.len(),
        points = points.len(),
        "terminator sampled"
    );

    let fetched = fetch_in_batches(directory, &points, &cfg.fetch.params()).await;
    let cameras = fetched.cameras.len();

    let classified = classify(
        fetched.cameras,
        &plan.sunrise,
        &plan.sunset,
        cfg.geometry.rank_order,
    );
    counter!("ingest_cameras_total", "phase" => "sunrise").increment(classified.sunrise.len() as u64);
    counter!("ingest_cameras_total", "phase" => "sunset").increment(classified.sunset.len() as u64);

    let report = reconcile(
        store,
        &cfg.reconcile.source,
        &classified,
        cfg.reconcile.store_concurrency,
        now,
    )
    .await?;

    histogram!("ingest_run_duration_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    gauge!("ingest_pipeline_last_run_ts").set(now.timestamp().max(0) as f64);

    let summary = RunSummary {
        ok: true,
        sunrise: classified.sunrise.len(),
        sunset: classified.sunset.len(),
        cameras,
        sample_points: points.len(),
        queries_failed: fetched.points_failed,
        upserts_attempted: report.upserts_attempted,
        upserts_failed: report.upserts_failed,
        states_written: report.states_written,
        deactivated: report.deactivated,
    };
    tracing::info!(
        target: "ingest",
        sunrise = summary.sunrise,
        sunset = summary.sunset,
        queries_failed = summary.queries_failed,
        upserts_failed = summary.upserts_failed,
        deactivated = summary.deactivated,
        "run complete"
    );
    Ok(summary)
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("a run is already in progress")]
    Busy,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Directory + store + config, with a lock so runs never overlap.
pub struct Pipeline {
    directory: Arc<dyn CameraDirectory>,
    store: Arc<dyn WebcamStore>,
    cfg: PipelineConfig,
    running: Mutex<()>,
}

impl Pipeline {
    pub fn new(
        directory: Arc<dyn CameraDirectory>,
        store: Arc<dyn WebcamStore>,
        cfg: PipelineConfig,
    ) -> Self {
        Self {
            directory,
            store,
            cfg,
            running: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn WebcamStore> {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    /// Run now, or report `Busy` if another run holds the lock.
    pub async fn try_run(&self, now: DateTime<Utc>) -> Result<RunSummary, RunError> {
        let Ok(_guard) = self.running.try_lock() else {
            tracing::info!(target: "ingest", "run skipped: previous run still in progress");
            return Err(RunError::Busy);
        };
        Ok(run_once(self.directory.clone(), self.store.clone(), &self.cfg, now).await?)
    }

    /// Wait for any in-flight run, then run.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunSummary, StoreError> {
        let _guard = self.running.lock().await;
        run_once(self.directory.clone(), self.store.clone(), &self.cfg, now).await
    }
}
