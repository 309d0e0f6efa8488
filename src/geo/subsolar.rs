// src/geo/subsolar.rs
//! Sub-solar point for an instant, using the low-precision solar position
//! series (Meeus, ch. 25). Accuracy is well under half a degree, which is all
//! a webcam search needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{normalize_deg, normalize_hours};

const UNIX_EPOCH_JD: f64 = 2_440_587.5;
const J2000_JD: f64 = 2_451_545.0;
const MS_PER_DAY: f64 = 86_400_000.0;

/// Sub-solar point plus the two angles the ring split needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubsolarPoint {
    pub lat: f64,
    pub lng: f64,
    /// Apparent right ascension of the sun, hours in `[0, 24)`.
    pub right_ascension_hours: f64,
    /// Greenwich mean sidereal time, hours in `[0, 24)`.
    pub sidereal_time_hours: f64,
}

/// Days since J2000.0 for the given instant.
pub fn days_since_j2000(at: DateTime<Utc>) -> f64 {
    let jd = at.timestamp_millis() as f64 / MS_PER_DAY + UNIX_EPOCH_JD;
    jd - J2000_JD
}

/// GMST in hours (USNO linear approximation).
pub fn gmst_hours(at: DateTime<Utc>) -> f64 {
    let d = days_since_j2000(at);
    normalize_hours(18.697_374_558 + 24.065_709_824_419_08 * d)
}

/// Right ascension in hours from apparent ecliptic longitude and obliquity
/// (both in degrees).
pub fn right_ascension_hours(apparent_longitude_deg: f64, obliquity_deg: f64) -> f64 {
    let l = apparent_longitude_deg.to_radians();
    let e = obliquity_deg.to_radians();
    let ra = (e.cos() * l.sin()).atan2(l.cos());
    normalize_hours(ra.to_degrees() / 15.0)
}

/// Solar coordinates for a given Julian century offset from J2000.
#[derive(Debug, Clone, Copy)]
struct SolarCoords {
    apparent_longitude_deg: f64,
    obliquity_deg: f64,
    declination_deg: f64,
}

fn solar_coords(t: f64) -> SolarCoords {
    let mean_longitude = (280.466_46 + t * (36_000.769_83 + t * 0.000_303_2)).rem_euclid(360.0);
    let mean_anomaly = 357.529_11 + t * (35_999.050_29 - 0.000_153_7 * t);
    let m = mean_anomaly.to_radians();

    let center = m.sin() * (1.914_602 - t * (0.004_817 + 0.000_014 * t))
        + (2.0 * m).sin() * (0.019_993 - 0.000_101 * t)
        + (3.0 * m).sin() * 0.000_289;
    let true_longitude = mean_longitude + center;

    let omega = (125.04 - 1_934.136 * t).to_radians();
    let apparent_longitude_deg = true_longitude - 0.005_69 - 0.004_78 * omega.sin();

    let mean_obliquity =
        23.0 + (26.0 + (21.448 - t * (46.815 + t * (0.000_59 - t * 0.001_813))) / 60.0) / 60.0;
    let obliquity_deg = mean_obliquity + 0.002_56 * omega.cos();

    let declination_deg = (obliquity_deg.to_radians().sin()
        * apparent_longitude_deg.to_radians().sin())
    .asin()
    .to_degrees();

    SolarCoords {
        apparent_longitude_deg,
        obliquity_deg,
        declination_deg,
    }
}

/// Sub-solar point at `at`. Pure function of time; no error conditions.
pub fn subsolar_point(at: DateTime<Utc>) -> SubsolarPoint {
    let t = days_since_j2000(at) / 36_525.0;
    let sun = solar_coords(t);

    let ra = right_ascension_hours(sun.apparent_longitude_deg, sun.obliquity_deg);
    let gmst = gmst_hours(at);

    SubsolarPoint {
        lat: sun.declination_deg,
        lng: normalize_deg(15.0 * (ra - gmst)),
        right_ascension_hours: ra,
        sidereal_time_hours: gmst,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn j2000_epoch_is_day_zero() {
        let at = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        assert!(days_since_j2000(at).abs() < 1e-9);
        // GMST at J2000.0 is ~18.697h
        assert!((gmst_hours(at) - 18.697_374_558).abs() < 1e-6);
    }

    #[test]
    fn ra_matches_longitude_at_cardinal_points() {
        assert!(right_ascension_hours(0.0, 23.44).abs() < 1e-9);
        assert!((right_ascension_hours(90.0, 23.44) - 6.0).abs() < 1e-9);
        assert!((right_ascension_hours(180.0, 23.44) - 12.0).abs() < 1e-9);
        assert!((right_ascension_hours(270.0, 23.44) - 18.0).abs() < 1e-9);
    }
}
