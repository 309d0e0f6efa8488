// src/store/reconcile.rs
//! Bring the store in line with one run's classification.
//!
//! Order matters: every webcam is upserted first (state rows need its id),
//! then the per-phase state rows are written with rank = list position, and
//! only then are rows missing from this run deactivated. A webcam that fails
//! its upsert is left out of the keep set, so its old state row goes stale.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use metrics::counter;
use serde::Serialize;

use super::{NewWebcam, StoreError, WebcamId, WebcamStore};
use crate::classify::Classified;
use crate::geo::Phase;

/// One record the store refused, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordFailure {
    pub external_id: String,
    pub phase: Phase,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub upserts_attempted: usize,
    pub upserts_failed: usize,
    pub states_written: usize,
    pub states_failed: usize,
    pub deactivated: u64,
    pub failures: Vec<RecordFailure>,
}

struct Upserted {
    phase: Phase,
    rank: i64,
    external_id: String,
    result: Result<WebcamId, StoreError>,
}

async fn upsert_one(
    store: Arc<dyn WebcamStore>,
    phase: Phase,
    rank: i64,
    external_id: String,
    webcam: Result<NewWebcam, StoreError>,
    now: DateTime<Utc>,
) -> Upserted {
    let result = match webcam {
        Ok(w) => store.upsert_webcam(&w, now).await,
        Err(e) => Err(e),
    };
    Upserted {
        phase,
        rank,
        external_id,
        result,
    }
}

async fn write_state(
    store: Arc<dyn WebcamStore>,
    phase: Phase,
    rank: i64,
    id: WebcamId,
    now: DateTime<Utc>,
) -> (Phase, WebcamId, Result<(), StoreError>) {
    let res = store.upsert_terminator_state(id, phase, rank, now).await;
    (phase, id, res)
}

/// Drive `jobs` with at most `limit` in flight; output is completion order.
async fn run_bounded<F: Future>(jobs: Vec<F>, limit: usize) -> Vec<F::Output> {
    let mut pending = jobs.into_iter();
    let mut in_flight = FuturesUnordered::new();
    let mut out = Vec::with_capacity(pending.len());
    loop {
        while in_flight.len() < limit {
            match pending.next() {
                Some(job) => in_flight.push(job),
                None => break,
            }
        }
        match in_flight.next().await {
            Some(done) => out.push(done),
            None => break,
        }
    }
    out
}

pub async fn reconcile(
    store: Arc<dyn WebcamStore>,
    source: &str,
    classified: &Classified,
    concurrency: usize,
    now: DateTime<Utc>,
) -> Result<ReconcileReport, StoreError> {
    let concurrency = concurrency.max(1);
    let mut report = ReconcileReport::default();

    // 1) webcams
    let mut jobs = Vec::with_capacity(classified.sunrise.len() + classified.sunset.len());
    for phase in Phase::ALL {
        for (rank, cam) in classified.phase(phase).iter().enumerate() {
            jobs.push(upsert_one(
                store.clone(),
                phase,
                rank as i64,
                cam.external_id.clone(),
                NewWebcam::from_record(source, cam),
                now,
            ));
        }
    }
    let upserts = run_bounded(jobs, concurrency).await;

    let mut ranked: BTreeMap<Phase, Vec<(i64, WebcamId)>> = BTreeMap::new();
    let mut fatal: Option<StoreError> = None;
    for Upserted {
        phase,
        rank,
        external_id,
        result,
    } in upserts
    {
        report.upserts_attempted += 1;
        counter!("reconcile_upserts_total").increment(1);
        match result {
            Ok(id) => ranked.entry(phase).or_default().push((rank, id)),
            Err(e) => {
                report.upserts_failed += 1;
                counter!("reconcile_upsert_failures_total").increment(1);
                tracing::warn!(
                    target: "reconcile",
                    external_id = %external_id,
                    phase = %phase,
                    error = %e,
                    "webcam upsert failed"
                );
                report.failures.push(RecordFailure {
                    external_id,
                    phase,
                    error: e.to_string(),
                });
                if e.is_fatal() && fatal.is_none() {
                    fatal = Some(e);
                }
            }
        }
    }
    if let Some(e) = fatal {
        return Err(e);
    }

    // 2) terminator state rows
    let mut state_jobs = Vec::new();
    for (&phase, rows) in &ranked {
        for &(rank, id) in rows {
            state_jobs.push(write_state(store.clone(), phase, rank, id, now));
        }
    }
    let states = run_bounded(state_jobs, concurrency).await;

    for (phase, id, res) in states {
        match res {
            Ok(()) => report.states_written += 1,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                report.states_failed += 1;
                tracing::warn!(
                    target: "reconcile",
                    webcam_id = id,
                    phase = %phase,
                    error = %e,
                    "terminator state upsert failed"
                );
            }
        }
    }

    // 3) deactivate whatever this run did not see
    for phase in Phase::ALL {
        let keep: Vec<WebcamId> = ranked
            .get(&phase)
            .map(|rows| rows.iter().map(|&(_, id)| id).collect())
            .unwrap_or_default();
        let n = store.deactivate_missing(phase, &keep, now).await?;
        counter!("reconcile_deactivated_total").increment(n);
        report.deactivated += n;
    }

    tracing::info!(
        target: "reconcile",
        attempted = report.upserts_attempted,
        failed = report.upserts_failed,
        states = report.states_written,
        deactivated = report.deactivated,
        "reconcile done"
    );
    Ok(report)
}
