//! # Geo
//! Terminator geometry: subsolar point, ring generation, arc split and
//! sample coordinates for directory queries.
//!
//! Everything in here is a pure function of its inputs. Nothing is cached
//! across runs; the pipeline recomputes the geometry from "now" every time.

pub mod ring;
pub mod sampler;
pub mod subsolar;

use serde::{Deserialize, Serialize};

pub use ring::{split_arcs, terminator_ring, ArcSplit, TerminatorArc, TerminatorRing};
pub use sampler::{dedupe_coords, sample_arc};
pub use subsolar::{subsolar_point, SubsolarPoint};

/// A point on the globe in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    /// Euclidean distance in degree-space. The longitude difference is wrapped
    /// into `(-180, 180]` so points on either side of the antimeridian compare
    /// as neighbours.
    pub fn degree_distance(&self, other: &Location) -> f64 {
        let dlat = self.lat - other.lat;
        let dlng = normalize_deg(self.lng - other.lng);
        (dlat * dlat + dlng * dlng).sqrt()
    }
}

/// Which side of the terminator a point (or a webcam) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Sunrise,
    Sunset,
}

impl Phase {
    pub const ALL: [Phase; 2] = [Phase::Sunrise, Phase::Sunset];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Sunrise => "sunrise",
            Phase::Sunset => "sunset",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sunrise" => Some(Phase::Sunrise),
            "sunset" => Some(Phase::Sunset),
            _ => None,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize hours into `[0, 24)`.
pub fn normalize_hours(h: f64) -> f64 {
    let x = h.rem_euclid(24.0);
    // rem_euclid can round up to exactly 24.0 for tiny negative inputs
    if x >= 24.0 {
        0.0
    } else {
        x
    }
}

/// Normalize hours into `(-12, +12]`.
pub fn normalize_signed_hours(h: f64) -> f64 {
    let x = normalize_hours(h);
    if x > 12.0 {
        x - 24.0
    } else {
        x
    }
}

/// Normalize a longitude into `(-180, 180]`.
pub fn normalize_deg(d: f64) -> f64 {
    let x = (d + 180.0).rem_euclid(360.0) - 180.0;
    if x <= -180.0 {
        x + 360.0
    } else {
        x
    }
}
