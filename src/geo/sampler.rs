// src/geo/sampler.rs
use std::collections::HashSet;

use super::{normalize_deg, Location};

/// Rounding applied before comparing coordinates (6 decimal degrees).
const DEDUP_SCALE: f64 = 1e6;

fn dedup_key(p: &Location) -> (i64, i64) {
    (
        (p.lat * DEDUP_SCALE).round() as i64,
        (p.lng * DEDUP_SCALE).round() as i64,
    )
}

/// Drop coordinates that collide at 6-decimal precision, keeping first-seen order.
pub fn dedupe_coords<I>(coords: I) -> Vec<Location>
where
    I: IntoIterator<Item = Location>,
{
    let mut seen = HashSet::new();
    coords
        .into_iter()
        .filter(|p| p.is_finite() && seen.insert(dedup_key(p)))
        .collect()
}

/// Great-circle midpoint of two points.
pub fn midpoint(a: Location, b: Location) -> Location {
    let (phi1, phi2) = (a.lat.to_radians(), b.lat.to_radians());
    let lambda1 = a.lng.to_radians();
    let dlambda = normalize_deg(b.lng - a.lng).to_radians();

    let bx = phi2.cos() * dlambda.cos();
    let by = phi2.cos() * dlambda.sin();
    let phi = (phi1.sin() + phi2.sin()).atan2(((phi1.cos() + bx).powi(2) + by * by).sqrt());
    let lambda = lambda1 + by.atan2(phi1.cos() + bx);

    Location {
        lat: phi.to_degrees(),
        lng: normalize_deg(lambda.to_degrees()),
    }
}

/// Search centres for one arc: its vertices, optionally with a midpoint
/// between each consecutive pair, deduplicated.
pub fn sample_arc(points: &[Location], with_midpoints: bool) -> Vec<Location> {
    if !with_midpoints || points.len() < 2 {
        return dedupe_coords(points.iter().copied());
    }

    let mut out = Vec::with_capacity(points.len() * 2);
    for pair in points.windows(2) {
        out.push(pair[0]);
        out.push(midpoint(pair[0], pair[1]));
    }
    if let Some(last) = points.last() {
        out.push(*last);
    }
    dedupe_coords(out)
}
