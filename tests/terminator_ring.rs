// tests/terminator_ring.rs
use chrono::{TimeZone, Utc};
use terminator_webcams::geo::ring::{hour_angle_hours, shifted_terminator_ring};
use terminator_webcams::geo::{split_arcs, subsolar_point, terminator_ring, Location, Phase};

fn angular_distance(a: Location, b: Location) -> f64 {
    let (p1, p2) = (a.lat.to_radians(), b.lat.to_radians());
    let dl = (b.lng - a.lng).to_radians();
    let c = p1.sin() * p2.sin() + p1.cos() * p2.cos() * dl.cos();
    c.clamp(-1.0, 1.0).acos().to_degrees()
}

#[test]
fn ring_is_closed_and_sized_by_precision() {
    let s = subsolar_point(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());

    let ring = terminator_ring(&s, 12.0, -13.0);
    assert!(ring.is_closed());
    assert_eq!(ring.vertices().len(), 30);
    assert_eq!(ring.points.len(), 31);

    let fine = terminator_ring(&s, 4.0, -13.0);
    assert_eq!(fine.vertices().len(), 90);
}

#[test]
fn every_vertex_sits_at_the_ring_radius() {
    let s = subsolar_point(Utc.with_ymd_and_hms(2024, 9, 10, 18, 45, 0).unwrap());
    let center = Location::new(s.lat, s.lng);
    for altitude in [0.0, -6.0, -13.0] {
        let ring = terminator_ring(&s, 12.0, altitude);
        for p in ring.vertices() {
            let d = angular_distance(center, *p);
            assert!((d - (90.0 - altitude)).abs() < 1e-6, "d = {d}");
            assert!(p.lng > -180.0 && p.lng <= 180.0);
        }
    }
}

#[test]
fn shifted_ring_is_centred_west_of_the_sun() {
    let s = subsolar_point(Utc.with_ymd_and_hms(2024, 2, 2, 2, 0, 0).unwrap());
    let ring = shifted_terminator_ring(&s, 12.0, -13.0, 15.75);
    let mut west = s.lng - 15.75;
    if west <= -180.0 {
        west += 360.0;
    }
    let center = Location::new(s.lat, west);
    for p in ring.vertices() {
        assert!((angular_distance(center, *p) - 103.0).abs() < 1e-6);
    }
}

#[test]
fn arcs_partition_the_ring_by_hour_angle() {
    let s = subsolar_point(Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap());
    let ring = terminator_ring(&s, 12.0, -13.0);
    let split = split_arcs(&ring, &s);

    assert!(!split.sunrise.points.is_empty());
    assert!(!split.sunset.points.is_empty());
    assert_eq!(
        split.sunrise.points.len() + split.sunset.points.len(),
        ring.vertices().len()
    );
    assert_eq!(split.sunrise.runs, 1);
    assert_eq!(split.sunset.runs, 1);

    for p in &split.sunrise.points {
        assert!(hour_angle_hours(p.lng, &s) < 0.0);
    }
    for p in &split.sunset.points {
        assert!(hour_angle_hours(p.lng, &s) >= 0.0);
    }
    assert_eq!(split.arc(Phase::Sunrise).phase, Phase::Sunrise);
}

#[test]
fn sunrise_arc_is_west_of_the_sun() {
    // Morning side: the sun has yet to cross the local meridian, so the
    // sunrise arc lies at western longitudes relative to the sub-solar point.
    let s = subsolar_point(Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap());
    let split = split_arcs(&terminator_ring(&s, 12.0, -13.0), &s);
    let mean_offset = |pts: &[Location]| {
        pts.iter()
            .map(|p| {
                let mut d = p.lng - s.lng;
                if d > 180.0 {
                    d -= 360.0;
                }
                if d <= -180.0 {
                    d += 360.0;
                }
                d
            })
            .sum::<f64>()
            / pts.len() as f64
    };
    assert!(mean_offset(&split.sunrise.points) < 0.0);
    assert!(mean_offset(&split.sunset.points) > 0.0);
}

#[test]
fn arcs_stay_contiguous_across_the_ring_seam() {
    // Any instant: each arc's points are neighbours on the ring, in ring order.
    for h in [0, 5, 11, 17, 23] {
        let s = subsolar_point(Utc.with_ymd_and_hms(2024, 11, 3, h, 10, 0).unwrap());
        let ring = terminator_ring(&s, 12.0, -13.0);
        let split = split_arcs(&ring, &s);
        let verts = ring.vertices();
        let n = verts.len();
        for arc in [&split.sunrise, &split.sunset] {
            let idx: Vec<usize> = arc
                .points
                .iter()
                .map(|p| verts.iter().position(|v| v == p).unwrap())
                .collect();
            for w in idx.windows(2) {
                assert_eq!((w[0] + 1) % n, w[1], "hour {h}: arc not contiguous");
            }
        }
    }
}
