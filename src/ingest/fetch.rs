// src/ingest/fetch.rs
//! Batched, staggered directory queries.
//!
//! Coordinates are split into sequential batches. Queries inside a batch run
//! concurrently, each one delayed by `index * stagger`; consecutive batches
//! are separated by `batch_delay`. A failing query counts as an empty result.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use metrics::counter;

use crate::geo::Location;
use crate::ingest::types::{CameraDirectory, ExternalCameraRecord};

/// Fixed-window pacing for directory queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchParams {
    pub radius_deg: f64,
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub stagger: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    /// Union of all returned cameras, one per external id, in id order.
    pub cameras: Vec<ExternalCameraRecord>,
    pub points_queried: usize,
    pub points_failed: usize,
}

/// One staggered query, holding its own directory handle.
async fn query_point(
    directory: Arc<dyn CameraDirectory>,
    center: Location,
    radius_deg: f64,
    delay: Duration,
) -> (Location, anyhow::Result<Vec<ExternalCameraRecord>>) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    let result = directory.cameras_near(center, radius_deg).await;
    (center, result)
}

pub async fn fetch_in_batches(
    directory: Arc<dyn CameraDirectory>,
    coords: &[Location],
    params: &FetchParams,
) -> FetchReport {
    let batch_size = params.batch_size.max(1);
    let total_batches = coords.len().div_ceil(batch_size);
    let radius = params.radius_deg;

    let mut by_id: BTreeMap<String, ExternalCameraRecord> = BTreeMap::new();
    let mut failed = 0usize;

    for (batch_idx, batch) in coords.chunks(batch_size).enumerate() {
        if batch_idx > 0 && !params.batch_delay.is_zero() {
            tokio::time::sleep(params.batch_delay).await;
        }
        tracing::debug!(
            target: "fetch",
            batch = batch_idx + 1,
            total = total_batches,
            points = batch.len(),
            "processing batch"
        );

        let mut queries = Vec::with_capacity(batch.len());
        let mut delay = Duration::ZERO;
        for &center in batch {
            queries.push(query_point(directory.clone(), center, radius, delay));
            delay = delay.saturating_add(params.stagger);
        }

        // join_all keeps input order, so overlapping boxes resolve last-write-wins
        // in coordinate order.
        for (center, result) in join_all(queries).await {
            counter!("ingest_queries_total").increment(1);
            match result {
                Ok(cams) => {
                    tracing::trace!(
                        target: "fetch",
                        lat = center.lat,
                        lng = center.lng,
                        found = cams.len(),
                        "query ok"
                    );
                    for cam in cams {
                        by_id.insert(cam.external_id.clone(), cam);
                    }
                }
                Err(e) => {
                    failed += 1;
                    counter!("ingest_query_errors_total").increment(1);
                    tracing::warn!(
                        target: "fetch",
                        provider = directory.name(),
                        lat = center.lat,
                        lng = center.lng,
                        error = ?e,
                        "directory query failed; treating as empty"
                    );
                }
            }
        }
    }

    FetchReport {
        cameras: by_id.into_values().collect(),
        points_queried: coords.len(),
        points_failed: failed,
    }
}
