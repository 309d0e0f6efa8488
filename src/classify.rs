//! # Webcam classification
//! Assigns each camera to the sunrise or sunset side by its nearest sample
//! point and orders each side into a rank list.
//!
//! Distances are degree-space Euclidean: this is a relative "which arc is
//! closer" comparison, not a measurement.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::geo::{Location, Phase};
use crate::ingest::types::ExternalCameraRecord;

/// How rank lists are ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankOrder {
    /// Sunrise east→west (descending longitude), sunset west→east.
    #[default]
    Longitude,
    /// Sunrise north→south, sunset south→north.
    Latitude,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classified {
    pub sunrise: Vec<ExternalCameraRecord>,
    pub sunset: Vec<ExternalCameraRecord>,
}

impl Classified {
    pub fn phase(&self, phase: Phase) -> &[ExternalCameraRecord] {
        match phase {
            Phase::Sunrise => &self.sunrise,
            Phase::Sunset => &self.sunset,
        }
    }

    pub fn len(&self) -> usize {
        self.sunrise.len() + self.sunset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Smallest distance from `p` to any sample; infinite when there are none.
pub fn nearest_distance(p: Location, samples: &[Location]) -> f64 {
    samples
        .iter()
        .map(|s| p.degree_distance(s))
        .fold(f64::INFINITY, f64::min)
}

/// Phase of the nearer arc. Equal distances go to sunset.
pub fn phase_for(p: Location, sunrise: &[Location], sunset: &[Location]) -> Phase {
    if nearest_distance(p, sunrise) < nearest_distance(p, sunset) {
        Phase::Sunrise
    } else {
        Phase::Sunset
    }
}

fn rank_cmp(phase: Phase, order: RankOrder, a: Location, b: Location) -> Ordering {
    match (order, phase) {
        (RankOrder::Longitude, Phase::Sunrise) => b.lng.total_cmp(&a.lng),
        (RankOrder::Longitude, Phase::Sunset) => a.lng.total_cmp(&b.lng),
        (RankOrder::Latitude, Phase::Sunrise) => b.lat.total_cmp(&a.lat),
        (RankOrder::Latitude, Phase::Sunset) => a.lat.total_cmp(&b.lat),
    }
}

/// Split cameras by phase and sort each list into rank order. Cameras with no
/// location are dropped. The sort is stable, so equal keys keep input order.
pub fn classify(
    cameras: Vec<ExternalCameraRecord>,
    sunrise_samples: &[Location],
    sunset_samples: &[Location],
    order: RankOrder,
) -> Classified {
    let mut out = Classified::default();

    for cam in cameras {
        let Some(p) = cam.point() else {
            continue;
        };
        match phase_for(p, sunrise_samples, sunset_samples) {
            Phase::Sunrise => out.sunrise.push(cam),
            Phase::Sunset => out.sunset.push(cam),
        }
    }

    for phase in Phase::ALL {
        let list = match phase {
            Phase::Sunrise => &mut out.sunrise,
            Phase::Sunset => &mut out.sunset,
        };
        // Every camera in a list has a location; the fallback keeps the sort total.
        list.sort_by(|a, b| {
            let pa = a.point().unwrap_or(Location::new(0.0, 0.0));
            let pb = b.point().unwrap_or(Location::new(0.0, 0.0));
            rank_cmp(phase, order, pa, pb)
        });
    }

    out
}
