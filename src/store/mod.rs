// src/store/mod.rs
//! Persistence for webcams and their per-phase terminator state.
//!
//! Two rows describe a camera on the terminator:
//! - a webcam row keyed by `(source, external_id)`, carrying the directory's
//!   metadata and an internal id;
//! - one terminator-state row per `(webcam_id, phase)` with rank and an
//!   active flag.

pub mod memory;
pub mod reconcile;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::geo::{normalize_deg, Phase};
use crate::ingest::types::{CameraLocation, CameraMetadata, ExternalCameraRecord};

pub use memory::MemoryStore;
pub use reconcile::{reconcile, ReconcileReport};
pub use sqlite::SqliteStore;

pub type WebcamId = i64;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store cannot be reached at all; the run stops.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A single write was rejected; the run carries on.
    #[error("store rejected record: {0}")]
    Record(String),
    #[error("malformed record {external_id}: {reason}")]
    Malformed { external_id: String, reason: String },
}

impl StoreError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }

    fn malformed(external_id: &str, reason: impl Into<String>) -> Self {
        StoreError::Malformed {
            external_id: external_id.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebcamRecord {
    pub id: WebcamId,
    pub source: String,
    pub external_id: String,
    pub title: Option<String>,
    pub status: Option<String>,
    pub view_count: Option<i64>,
    pub location: CameraLocation,
    pub metadata: CameraMetadata,
    /// Owned by other writers; upserts never touch these two.
    pub rating: Option<f64>,
    pub orientation: Option<String>,
    pub last_fetched_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerminatorState {
    pub webcam_id: WebcamId,
    pub phase: Phase,
    pub rank: i64,
    pub last_seen_at: DateTime<Utc>,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

/// Read-side join of an active state row and its webcam.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerminatorWebcam {
    pub phase: Phase,
    pub rank: i64,
    pub webcam: WebcamRecord,
}

/// Validated input for `upsert_webcam`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWebcam {
    pub source: String,
    pub external_id: String,
    pub title: Option<String>,
    pub status: Option<String>,
    pub view_count: Option<i64>,
    pub location: CameraLocation,
    pub metadata: CameraMetadata,
}

impl NewWebcam {
    /// Reject records the store could never accept: no id, no location, or
    /// coordinates that are not on the globe.
    pub fn from_record(source: &str, rec: &ExternalCameraRecord) -> Result<Self, StoreError> {
        let external_id = rec.external_id.trim();
        if external_id.is_empty() {
            return Err(StoreError::malformed(&rec.external_id, "empty external id"));
        }
        let Some(loc) = rec.location.as_ref() else {
            return Err(StoreError::malformed(external_id, "missing location"));
        };
        if !loc.point().is_finite() {
            return Err(StoreError::malformed(external_id, "non-finite coordinates"));
        }
        if !(-90.0..=90.0).contains(&loc.lat) {
            return Err(StoreError::malformed(
                external_id,
                format!("latitude {} out of range", loc.lat),
            ));
        }

        let mut location = loc.clone();
        location.lng = normalize_deg(location.lng);

        Ok(Self {
            source: source.to_string(),
            external_id: external_id.to_string(),
            title: rec.title.clone(),
            status: rec.status.clone(),
            view_count: rec.view_count,
            location,
            metadata: rec.metadata.clone(),
        })
    }

    /// Fields whose change bumps `updated_at`. View count and place names
    /// are refreshed silently.
    pub fn differs_from(&self, existing: &WebcamRecord) -> bool {
        self.title != existing.title
            || self.status != existing.status
            || self.location.lat != existing.location.lat
            || self.location.lng != existing.location.lng
            || self.metadata != existing.metadata
    }
}

/// Metadata as stored: one JSON text column per field, NULL when absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct MetadataColumns {
    pub images: Option<String>,
    pub urls: Option<String>,
    pub player: Option<String>,
    pub categories: Option<String>,
}

impl MetadataColumns {
    pub fn encode(m: &CameraMetadata) -> Result<Self, serde_json::Error> {
        Ok(Self {
            images: m.images.as_ref().map(serde_json::to_string).transpose()?,
            urls: m.urls.as_ref().map(serde_json::to_string).transpose()?,
            player: m.player.as_ref().map(serde_json::to_string).transpose()?,
            categories: m.categories.as_ref().map(serde_json::to_string).transpose()?,
        })
    }

    pub fn decode(&self) -> Result<CameraMetadata, serde_json::Error> {
        Ok(CameraMetadata {
            images: self.images.as_deref().map(serde_json::from_str).transpose()?,
            urls: self.urls.as_deref().map(serde_json::from_str).transpose()?,
            player: self.player.as_deref().map(serde_json::from_str).transpose()?,
            categories: self
                .categories
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
        })
    }
}

#[async_trait]
pub trait WebcamStore: Send + Sync {
    /// Insert or update by `(source, external_id)`; returns the internal id.
    /// `updated_at` moves only when a tracked field changed.
    async fn upsert_webcam(
        &self,
        webcam: &NewWebcam,
        now: DateTime<Utc>,
    ) -> Result<WebcamId, StoreError>;

    /// Insert or update by `(webcam_id, phase)`, leaving the row active.
    async fn upsert_terminator_state(
        &self,
        webcam_id: WebcamId,
        phase: Phase,
        rank: i64,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Deactivate every active row of `phase` whose webcam id is not in
    /// `keep`. An empty `keep` deactivates the whole phase. Returns the number
    /// of rows changed.
    async fn deactivate_missing(
        &self,
        phase: Phase,
        keep: &[WebcamId],
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    async fn find_webcam(
        &self,
        source: &str,
        external_id: &str,
    ) -> Result<Option<WebcamRecord>, StoreError>;

    async fn terminator_state(
        &self,
        webcam_id: WebcamId,
        phase: Phase,
    ) -> Result<Option<TerminatorState>, StoreError>;

    /// Active state rows joined to webcams whose status is `active`,
    /// sunrise first, then by rank.
    async fn active_terminator_webcams(
        &self,
        limit: usize,
    ) -> Result<Vec<TerminatorWebcam>, StoreError>;

    /// Every webcam row, most recently changed first (`updated_at` desc,
    /// then id).
    async fn recent_webcams(&self, limit: usize) -> Result<Vec<WebcamRecord>, StoreError>;
}
