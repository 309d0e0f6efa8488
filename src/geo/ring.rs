// src/geo/ring.rs
//! Terminator ring: a geodesic small circle around the sub-solar point,
//! split into a sunrise arc and a sunset arc by local hour angle.

use serde::Serialize;

use super::{normalize_deg, normalize_hours, normalize_signed_hours, Location, Phase, SubsolarPoint};

/// Closed ring of points; the last point repeats the first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerminatorRing {
    pub points: Vec<Location>,
}

impl TerminatorRing {
    /// Ring vertices without the closing duplicate.
    pub fn vertices(&self) -> &[Location] {
        match self.points.len() {
            0 => &[],
            n => &self.points[..n - 1],
        }
    }

    pub fn is_closed(&self) -> bool {
        match (self.points.first(), self.points.last()) {
            (Some(a), Some(b)) => self.points.len() > 1 && a == b,
            _ => false,
        }
    }
}

/// One side of the terminator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerminatorArc {
    pub phase: Phase,
    pub points: Vec<Location>,
    /// Number of contiguous runs that fed this arc (2 crossings per ring → 1 run each).
    pub runs: usize,
}

impl TerminatorArc {
    fn empty(phase: Phase) -> Self {
        Self {
            phase,
            points: Vec::new(),
            runs: 0,
        }
    }

    /// Push unless it repeats the last point exactly.
    fn push(&mut self, pt: Location) {
        if self.points.last() != Some(&pt) {
            self.points.push(pt);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArcSplit {
    pub sunrise: TerminatorArc,
    pub sunset: TerminatorArc,
}

impl ArcSplit {
    pub fn arc(&self, phase: Phase) -> &TerminatorArc {
        match phase {
            Phase::Sunrise => &self.sunrise,
            Phase::Sunset => &self.sunset,
        }
    }

    fn arc_mut(&mut self, phase: Phase) -> &mut TerminatorArc {
        match phase {
            Phase::Sunrise => &mut self.sunrise,
            Phase::Sunset => &mut self.sunset,
        }
    }
}

/// Point at angular distance `radius_deg` from `center` along `bearing_deg`
/// (great-circle destination on a unit sphere).
pub fn destination(center: Location, radius_deg: f64, bearing_deg: f64) -> Location {
    let phi0 = center.lat.to_radians();
    let r = radius_deg.to_radians();
    let theta = bearing_deg.to_radians();

    let sin_phi = (phi0.sin() * r.cos() + phi0.cos() * r.sin() * theta.cos()).clamp(-1.0, 1.0);
    let phi = sin_phi.asin();
    let dlambda = (theta.sin() * r.sin() * phi0.cos()).atan2(r.cos() - phi0.sin() * sin_phi);

    Location {
        lat: phi.to_degrees(),
        lng: normalize_deg(center.lng + dlambda.to_degrees()),
    }
}

/// Number of ring vertices for a given angular step.
pub fn vertex_count(precision_deg: f64) -> usize {
    let n = (360.0 / precision_deg - 1e-9).ceil();
    if n.is_finite() {
        (n as usize).max(3)
    } else {
        3
    }
}

/// Geodesic small circle around `center`, closed.
pub fn small_circle(center: Location, radius_deg: f64, precision_deg: f64) -> TerminatorRing {
    let n = vertex_count(precision_deg);
    let step = 360.0 / n as f64;

    let mut points: Vec<Location> = (0..n)
        .map(|k| destination(center, radius_deg, k as f64 * step))
        .collect();
    if let Some(first) = points.first().copied() {
        points.push(first);
    }
    TerminatorRing { points }
}

/// Terminator ring at angular radius `90 - sun_altitude_deg` around the
/// sub-solar point. Negative altitudes push the ring past the geometric
/// terminator into twilight.
pub fn terminator_ring(
    subsolar: &SubsolarPoint,
    precision_deg: f64,
    sun_altitude_deg: f64,
) -> TerminatorRing {
    shifted_terminator_ring(subsolar, precision_deg, sun_altitude_deg, 0.0)
}

/// Same as [`terminator_ring`] with the centre moved `west_offset_deg` of
/// longitude to the west, for auxiliary query rings.
pub fn shifted_terminator_ring(
    subsolar: &SubsolarPoint,
    precision_deg: f64,
    sun_altitude_deg: f64,
    west_offset_deg: f64,
) -> TerminatorRing {
    let center = Location::new(subsolar.lat, normalize_deg(subsolar.lng - west_offset_deg));
    small_circle(center, 90.0 - sun_altitude_deg, precision_deg)
}

/// Local hour angle (hours, `(-12, +12]`) at longitude `lng_deg`.
/// Negative means the sun has not reached the meridian yet (morning side).
pub fn hour_angle_hours(lng_deg: f64, subsolar: &SubsolarPoint) -> f64 {
    let lst = normalize_hours(subsolar.sidereal_time_hours + lng_deg / 15.0);
    normalize_signed_hours(lst - subsolar.right_ascension_hours)
}

pub fn phase_at(lng_deg: f64, subsolar: &SubsolarPoint) -> Phase {
    if hour_angle_hours(lng_deg, subsolar) < 0.0 {
        Phase::Sunrise
    } else {
        Phase::Sunset
    }
}

/// Partition ring vertices into a sunrise and a sunset arc.
///
/// The walk starts at the first classification change so a side that wraps
/// past the ring's seam still comes out as one chain; cyclic order is kept.
/// Any number of sign changes is handled, each change opening a new run on
/// the other arc.
pub fn split_arcs(ring: &TerminatorRing, subsolar: &SubsolarPoint) -> ArcSplit {
    let vertices = ring.vertices();
    let mut split = ArcSplit {
        sunrise: TerminatorArc::empty(Phase::Sunrise),
        sunset: TerminatorArc::empty(Phase::Sunset),
    };
    if vertices.is_empty() {
        return split;
    }

    let phases: Vec<Phase> = vertices.iter().map(|p| phase_at(p.lng, subsolar)).collect();
    let n = vertices.len();
    let start = (1..n).find(|&k| phases[k] != phases[k - 1]).unwrap_or(0);

    let mut current: Option<Phase> = None;
    for i in 0..n {
        let idx = (start + i) % n;
        let phase = phases[idx];
        if current != Some(phase) {
            split.arc_mut(phase).runs += 1;
            current = Some(phase);
        }
        split.arc_mut(phase).push(vertices[idx]);
    }
    split
}
