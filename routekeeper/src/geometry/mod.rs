//! Geometry utilities for route snapping.
//!
//! Pure functions over polylines (`&[Coordinate]`, ordered start to end) on a
//! spherical earth. Distances are in meters, headings in degrees clockwise from
//! true north.
//!
//! Segment projection uses a local equirectangular approximation centred on the
//! query point. Route steps are short enough (hundreds of meters to a few
//! kilometers) that the error is well below GPS noise.

mod types;

pub use types::{ClosestPoint, Coordinate, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};

/// Mean earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Slack used when comparing a requested distance against a polyline length.
const LENGTH_EPSILON_M: f64 = 1e-6;

/// Great-circle distance between two coordinates in meters (haversine).
pub fn distance(from: Coordinate, to: Coordinate) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (to.longitude - from.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
}

/// Initial great-circle bearing from `from` to `to`, in `[0, 360)`.
pub fn bearing(from: Coordinate, to: Coordinate) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlon = (to.longitude - from.longitude).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    normalize_heading(y.atan2(x).to_degrees())
}

/// Normalize a heading to `[0, 360)`.
pub fn normalize_heading(heading: f64) -> f64 {
    let normalized = ((heading % 360.0) + 360.0) % 360.0;
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}

/// Smallest angular difference between two headings, in `[0, 180]`.
///
/// Both inputs are normalized first, so 350° vs 10° is 20°.
pub fn bearing_difference(a: f64, b: f64) -> f64 {
    let diff = (normalize_heading(a) - normalize_heading(b)).abs();
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

/// Move `distance` meters from `origin` along `heading` on a great circle.
pub fn project(origin: Coordinate, distance: f64, heading: f64) -> Coordinate {
    let angular = distance / EARTH_RADIUS_M;
    let theta = heading.to_radians();
    let lat1 = origin.latitude.to_radians();
    let lon1 = origin.longitude.to_radians();

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * theta.cos()).asin();
    let lon2 = lon1
        + (theta.sin() * angular.sin() * lat1.cos()).atan2(angular.cos() - lat1.sin() * lat2.sin());

    let lon_deg = ((lon2.to_degrees() + 540.0) % 360.0) - 180.0;
    Coordinate::new(lat2.to_degrees(), lon_deg)
}

/// Total length of a polyline in meters.
pub fn polyline_length(polyline: &[Coordinate]) -> f64 {
    polyline
        .windows(2)
        .map(|pair| distance(pair[0], pair[1]))
        .sum()
}

/// Nearest point on `polyline` to `to`.
///
/// Every segment is projected and the global minimum kept. Returns `None` for an
/// empty polyline; a single-point polyline snaps to that point.
pub fn closest_point(polyline: &[Coordinate], to: Coordinate) -> Option<ClosestPoint> {
    let first = *polyline.first()?;

    if polyline.len() == 1 {
        return Some(ClosestPoint {
            coordinate: first,
            distance: distance(to, first),
            distance_from_start: 0.0,
            segment_index: 0,
        });
    }

    let mut best: Option<ClosestPoint> = None;
    let mut traveled = 0.0;

    for (index, pair) in polyline.windows(2).enumerate() {
        let (start, end) = (pair[0], pair[1]);
        let segment_length = distance(start, end);
        let t = segment_fraction(start, end, to);
        let snapped = interpolate(start, end, t);
        let offset = distance(to, snapped);

        if best.map_or(true, |b| offset < b.distance) {
            best = Some(ClosestPoint {
                coordinate: snapped,
                distance: offset,
                distance_from_start: traveled + segment_length * t,
                segment_index: index,
            });
        }

        traveled += segment_length;
    }

    best
}

/// Distance remaining to the end of `polyline`, measured from the closest
/// projection of `from`.
///
/// Returns `None` only if the polyline is empty.
pub fn distance_along(polyline: &[Coordinate], from: Coordinate) -> Option<f64> {
    let snapped = closest_point(polyline, from)?;

    // Sum from the snapped point forward so that a point snapped to the final
    // vertex yields exactly zero.
    let segment_start = snapped.segment_index;
    let Some(segment_end) = polyline.get(segment_start + 1) else {
        return Some(0.0);
    };
    let mut remaining = distance(snapped.coordinate, *segment_end);
    remaining += polyline_length(&polyline[segment_start + 1..]);

    Some(remaining)
}

/// Coordinate reached by walking `distance` meters from the start of `polyline`.
///
/// Returns `None` if the polyline is empty, `distance` is negative, or `distance`
/// exceeds the polyline length.
pub fn point_at_distance(polyline: &[Coordinate], distance_m: f64) -> Option<Coordinate> {
    if polyline.is_empty() || distance_m < 0.0 || !distance_m.is_finite() {
        return None;
    }

    let mut traveled = 0.0;
    for pair in polyline.windows(2) {
        let segment_length = distance(pair[0], pair[1]);
        if traveled + segment_length >= distance_m {
            if segment_length <= 0.0 {
                return Some(pair[0]);
            }
            let t = (distance_m - traveled) / segment_length;
            return Some(interpolate(pair[0], pair[1], t.clamp(0.0, 1.0)));
        }
        traveled += segment_length;
    }

    if distance_m <= traveled + LENGTH_EPSILON_M {
        polyline.last().copied()
    } else {
        None
    }
}

/// Fraction along segment `start → end` of the perpendicular foot of `point`,
/// clamped to `[0, 1]`.
fn segment_fraction(start: Coordinate, end: Coordinate, point: Coordinate) -> f64 {
    let cos_lat = point.latitude.to_radians().cos();
    let ax = (start.longitude - point.longitude) * cos_lat;
    let ay = start.latitude - point.latitude;
    let bx = (end.longitude - point.longitude) * cos_lat;
    let by = end.latitude - point.latitude;

    let dx = bx - ax;
    let dy = by - ay;
    let length_sq = dx * dx + dy * dy;
    if length_sq <= f64::EPSILON * f64::EPSILON {
        return 0.0;
    }

    (-(ax * dx + ay * dy) / length_sq).clamp(0.0, 1.0)
}

/// Linear interpolation between two nearby coordinates.
fn interpolate(start: Coordinate, end: Coordinate, t: f64) -> Coordinate {
    if t <= 0.0 {
        return start;
    }
    if t >= 1.0 {
        return end;
    }
    Coordinate::new(
        start.latitude + (end.latitude - start.latitude) * t,
        start.longitude + (end.longitude - start.longitude) * t,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Degrees of latitude spanning 100 m.
    const DEG_PER_100M: f64 = 100.0 / 111_195.0;

    fn straight_north() -> Vec<Coordinate> {
        vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.005, 0.0),
            Coordinate::new(0.01, 0.0),
        ]
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Distance and bearing
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_distance_one_degree_latitude() {
        let d = distance(Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 0.0));
        assert!((d - 111_195.0).abs() < 10.0, "got {}", d);
    }

    #[test]
    fn test_distance_same_point_is_zero() {
        let p = Coordinate::new(53.5, 10.0);
        assert_eq!(distance(p, p), 0.0);
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = Coordinate::new(0.0, 0.0);
        assert!((bearing(origin, Coordinate::new(1.0, 0.0)) - 0.0).abs() < 0.1);
        assert!((bearing(origin, Coordinate::new(0.0, 1.0)) - 90.0).abs() < 0.1);
        assert!((bearing(origin, Coordinate::new(-1.0, 0.0)) - 180.0).abs() < 0.1);
        assert!((bearing(origin, Coordinate::new(0.0, -1.0)) - 270.0).abs() < 0.1);
    }

    #[test]
    fn test_normalize_heading() {
        assert!((normalize_heading(0.0) - 0.0).abs() < 0.001);
        assert!((normalize_heading(360.0) - 0.0).abs() < 0.001);
        assert!((normalize_heading(-90.0) - 270.0).abs() < 0.001);
        assert!((normalize_heading(450.0) - 90.0).abs() < 0.001);
        assert!((normalize_heading(-450.0) - 270.0).abs() < 0.001);
    }

    #[test]
    fn test_bearing_difference_wraparound() {
        assert!((bearing_difference(90.0, 80.0) - 10.0).abs() < 0.001);
        assert!((bearing_difference(350.0, 10.0) - 20.0).abs() < 0.001);
        assert!((bearing_difference(10.0, 350.0) - 20.0).abs() < 0.001);
        assert!((bearing_difference(0.0, 180.0) - 180.0).abs() < 0.001);
        assert!((bearing_difference(-10.0, 730.0) - 20.0).abs() < 0.001);
    }

    #[test]
    fn test_project_north_100m() {
        let origin = Coordinate::new(0.0, 0.0);
        let moved = project(origin, 100.0, 0.0);
        assert!((moved.latitude - DEG_PER_100M).abs() < 1e-6);
        assert!(moved.longitude.abs() < 1e-9);
        assert!((distance(origin, moved) - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_project_zero_distance_is_identity() {
        let origin = Coordinate::new(48.1, 11.5);
        let moved = project(origin, 0.0, 123.0);
        assert!(distance(origin, moved) < 1e-6);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Polyline operations
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_closest_point_empty_polyline() {
        assert!(closest_point(&[], Coordinate::new(0.0, 0.0)).is_none());
        assert!(distance_along(&[], Coordinate::new(0.0, 0.0)).is_none());
    }

    #[test]
    fn test_closest_point_perpendicular_offset() {
        let line = straight_north();
        let query = project(Coordinate::new(0.007, 0.0), 30.0, 90.0);

        let snapped = closest_point(&line, query).unwrap();
        assert!((snapped.distance - 30.0).abs() < 0.5, "got {}", snapped.distance);
        assert_eq!(snapped.segment_index, 1);
        assert!((snapped.coordinate.latitude - 0.007).abs() < 1e-6);
    }

    #[test]
    fn test_closest_point_before_start_clamps() {
        let line = straight_north();
        let snapped = closest_point(&line, Coordinate::new(-0.001, 0.0)).unwrap();
        assert_eq!(snapped.coordinate, line[0]);
        assert_eq!(snapped.distance_from_start, 0.0);
    }

    #[test]
    fn test_distance_along_from_start_is_full_length() {
        let line = straight_north();
        let remaining = distance_along(&line, line[0]).unwrap();
        assert!((remaining - polyline_length(&line)).abs() < 1e-6);
    }

    #[test]
    fn test_distance_along_past_end_is_exactly_zero() {
        let line = straight_north();
        let remaining = distance_along(&line, Coordinate::new(0.02, 0.0)).unwrap();
        assert_eq!(remaining, 0.0);
    }

    #[test]
    fn test_distance_along_single_point() {
        let line = vec![Coordinate::new(1.0, 1.0)];
        assert_eq!(distance_along(&line, Coordinate::new(1.1, 1.0)), Some(0.0));
    }

    #[test]
    fn test_point_at_distance_midpoint() {
        let line = straight_north();
        let half = polyline_length(&line) / 2.0;
        let mid = point_at_distance(&line, half).unwrap();
        assert!((mid.latitude - 0.005).abs() < 1e-6);
    }

    #[test]
    fn test_point_at_distance_beyond_length() {
        let line = straight_north();
        let length = polyline_length(&line);
        assert!(point_at_distance(&line, length + 1.0).is_none());
        assert!(point_at_distance(&line, -1.0).is_none());
        let end = point_at_distance(&line, length).unwrap();
        assert!(distance(end, line[2]) < 1e-6);
        assert!(point_at_distance(&[], 0.0).is_none());
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_bearing_difference_in_range(a in -720.0..720.0_f64, b in -720.0..720.0_f64) {
                let d = bearing_difference(a, b);
                prop_assert!((0.0..=180.0).contains(&d), "difference {} out of range", d);
                prop_assert!((d - bearing_difference(b, a)).abs() < 1e-9);
            }

            #[test]
            fn test_distance_along_bounded_by_length(
                lat in -0.02..0.02_f64,
                lon in -0.02..0.02_f64,
            ) {
                let line = straight_north();
                let remaining = distance_along(&line, Coordinate::new(lat, lon)).unwrap();
                prop_assert!(remaining >= 0.0);
                prop_assert!(remaining <= polyline_length(&line) + 1e-6);
            }

            #[test]
            fn test_project_preserves_distance(
                distance_m in 0.0..5_000.0_f64,
                heading in 0.0..360.0_f64,
            ) {
                let origin = Coordinate::new(45.0, 7.0);
                let moved = project(origin, distance_m, heading);
                prop_assert!((distance(origin, moved) - distance_m).abs() < 0.05);
            }
        }
    }
}
