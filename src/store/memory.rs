// src/store/memory.rs
//! In-process store for tests and local runs without a database.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    NewWebcam, StoreError, TerminatorState, TerminatorWebcam, WebcamId, WebcamRecord, WebcamStore,
};
use crate::geo::Phase;

#[derive(Default)]
struct Inner {
    next_id: WebcamId,
    webcams: BTreeMap<WebcamId, WebcamRecord>,
    by_key: HashMap<(String, String), WebcamId>,
    states: BTreeMap<(WebcamId, Phase), TerminatorState>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `Unavailable` until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }

    /// Copy of every webcam row, in id order.
    pub fn webcams(&self) -> Vec<WebcamRecord> {
        self.inner
            .lock()
            .map(|g| g.webcams.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Copy of every state row, ordered by webcam id then phase.
    pub fn states(&self) -> Vec<TerminatorState> {
        self.inner
            .lock()
            .map(|g| g.states.values().cloned().collect())
            .unwrap_or_default()
    }

}

#[async_trait]
impl WebcamStore for MemoryStore {
    async fn upsert_webcam(
        &self,
        webcam: &NewWebcam,
        now: DateTime<Utc>,
    ) -> Result<WebcamId, StoreError> {
        let mut g = self.lock()?;
        let key = (webcam.source.clone(), webcam.external_id.clone());

        if let Some(&id) = g.by_key.get(&key) {
            if let Some(existing) = g.webcams.get_mut(&id) {
                let changed = webcam.differs_from(existing);
                existing.title = webcam.title.clone();
                existing.status = webcam.status.clone();
                existing.view_count = webcam.view_count;
                existing.location = webcam.location.clone();
                existing.metadata = webcam.metadata.clone();
                existing.last_fetched_at = now;
                if changed {
                    existing.updated_at = now;
                }
                return Ok(id);
            }
        }

        g.next_id += 1;
        let id = g.next_id;
        g.webcams.insert(
            id,
            WebcamRecord {
                id,
                source: webcam.source.clone(),
                external_id: webcam.external_id.clone(),
                title: webcam.title.clone(),
                status: webcam.status.clone(),
                view_count: webcam.view_count,
                location: webcam.location.clone(),
                metadata: webcam.metadata.clone(),
                rating: None,
                orientation: None,
                last_fetched_at: now,
                updated_at: now,
                created_at: now,
            },
        );
        g.by_key.insert(key, id);
        Ok(id)
    }

    async fn upsert_terminator_state(
        &self,
        webcam_id: WebcamId,
        phase: Phase,
        rank: i64,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut g = self.lock()?;
        if !g.webcams.contains_key(&webcam_id) {
            return Err(StoreError::Record(format!(
                "terminator state for unknown webcam {webcam_id}"
            )));
        }
        g.states.insert(
            (webcam_id, phase),
            TerminatorState {
                webcam_id,
                phase,
                rank,
                last_seen_at: now,
                active: true,
                updated_at: now,
            },
        );
        Ok(())
    }

    async fn deactivate_missing(
        &self,
        phase: Phase,
        keep: &[WebcamId],
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut g = self.lock()?;
        let mut changed = 0u64;
        for ((id, p), state) in g.states.iter_mut() {
            if *p == phase && state.active && !keep.contains(id) {
                state.active = false;
                state.updated_at = now;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn find_webcam(
        &self,
        source: &str,
        external_id: &str,
    ) -> Result<Option<WebcamRecord>, StoreError> {
        let g = self.lock()?;
        let key = (source.to_string(), external_id.to_string());
        Ok(g.by_key.get(&key).and_then(|id| g.webcams.get(id)).cloned())
    }

    async fn terminator_state(
        &self,
        webcam_id: WebcamId,
        phase: Phase,
    ) -> Result<Option<TerminatorState>, StoreError> {
        let g = self.lock()?;
        Ok(g.states.get(&(webcam_id, phase)).cloned())
    }

    async fn active_terminator_webcams(
        &self,
        limit: usize,
    ) -> Result<Vec<TerminatorWebcam>, StoreError> {
        let g = self.lock()?;
        let mut rows: Vec<TerminatorWebcam> = g
            .states
            .values()
            .filter(|s| s.active)
            .filter_map(|s| {
                let w = g.webcams.get(&s.webcam_id)?;
                (w.status.as_deref() == Some("active")).then(|| TerminatorWebcam {
                    phase: s.phase,
                    rank: s.rank,
                    webcam: w.clone(),
                })
            })
            .collect();
        rows.sort_by(|a, b| (a.phase, a.rank).cmp(&(b.phase, b.rank)));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn recent_webcams(&self, limit: usize) -> Result<Vec<WebcamRecord>, StoreError> {
        let g = self.lock()?;
        let mut rows: Vec<WebcamRecord> = g.webcams.values().cloned().collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        rows.truncate(limit);
        Ok(rows)
    }
}
