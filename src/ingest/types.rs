// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::geo::Location;

/// Where a camera sits, with the directory's place names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraLocation {
    pub lat: f64,
    pub lng: f64,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub continent: Option<String>,
}

impl CameraLocation {
    pub fn at(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            city: None,
            region: None,
            country: None,
            continent: None,
        }
    }

    pub fn point(&self) -> Location {
        Location::new(self.lat, self.lng)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSizes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<ImageSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<ImageSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<ImageSize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebcamImages {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<ImageSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daylight: Option<ImageSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sizes: Option<ImageSizes>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebcamUrls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebcamPlayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifetime: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

/// Display metadata. `None` means the directory did not send the field;
/// `Some(empty)` means it sent an empty value. Both survive a store round-trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraMetadata {
    pub images: Option<WebcamImages>,
    pub urls: Option<WebcamUrls>,
    pub player: Option<WebcamPlayer>,
    pub categories: Option<Vec<Category>>,
}

/// One physical camera as reported by the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalCameraRecord {
    pub external_id: String,
    pub title: Option<String>,
    pub view_count: Option<i64>,
    pub status: Option<String>,
    pub location: Option<CameraLocation>,
    pub metadata: CameraMetadata,
}

impl ExternalCameraRecord {
    /// Minimal record, handy for fixtures.
    pub fn new(external_id: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            external_id: external_id.into(),
            title: None,
            view_count: None,
            status: Some("active".to_string()),
            location: Some(CameraLocation::at(lat, lng)),
            metadata: CameraMetadata::default(),
        }
    }

    pub fn point(&self) -> Option<Location> {
        self.location.as_ref().map(CameraLocation::point)
    }
}

/// External webcam directory: cameras around a centre point.
#[async_trait::async_trait]
pub trait CameraDirectory: Send + Sync {
    /// Cameras within `radius_deg` of `center`. Errors are the caller's to
    /// absorb; a failing point must not take the run down.
    async fn cameras_near(&self, center: Location, radius_deg: f64)
        -> Result<Vec<ExternalCameraRecord>>;
    fn name(&self) -> &'static str;
}
