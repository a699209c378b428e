//! Distances, geodesic buffers and path sampling on the Earth's surface.

use crate::compute::validation::{validate_location, validate_radius};
use crate::error::{GeopinError, Result};
use geo::{Distance, Geodesic, Haversine, HaversineMeasure};
use geopin_types::{BoundingBox, Location};
use std::f64::consts::{FRAC_PI_2, PI};

/// Relative padding applied to buffer boxes. Boxes are derived on a sphere,
/// while the geodesic metric measures on the WGS84 ellipsoid; the two differ
/// by well under 1%.
const BUFFER_PAD: f64 = 0.01;

/// Distance metrics for exact filtering.
///
/// - **Haversine**: spherical great-circle distance, fast
/// - **Geodesic**: ellipsoidal distance (Karney 2013), more accurate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Haversine,
    #[default]
    Geodesic,
}

#[inline]
fn mean_radius() -> f64 {
    HaversineMeasure::GRS80_MEAN_RADIUS.radius()
}

/// Distance in meters between two locations.
///
/// # Examples
///
/// ```rust
/// use geopin::compute::{distance, DistanceMetric};
/// use geopin_types::Location;
///
/// let london = Location { lat: 51.5074, lon: -0.1278 };
/// let paris = Location { lat: 48.8566, lon: 2.3522 };
///
/// let d = distance(&london, &paris, DistanceMetric::Geodesic);
/// assert!(d > 340_000.0 && d < 345_000.0);
/// ```
pub fn distance(a: &Location, b: &Location, metric: DistanceMetric) -> f64 {
    match metric {
        DistanceMetric::Haversine => Haversine.distance(a.to_point(), b.to_point()),
        DistanceMetric::Geodesic => Geodesic.distance(a.to_point(), b.to_point()),
    }
}

/// Bounding box enclosing every point within `radius_m` of `center`.
///
/// Computed from the spherical cap around the center rather than a flat
/// degrees-per-meter offset, so boxes widen correctly towards the poles.
/// When the cap reaches a pole, or spills over the antimeridian, the
/// longitude span becomes the full [-180, 180].
///
/// # Errors
///
/// `InvalidInput` for invalid center or radius, `Geometry` if the result
/// is not finite.
pub fn buffer_bbox(center: &Location, radius_m: f64) -> Result<BoundingBox> {
    validate_location(center)?;
    validate_radius(radius_m)?;

    let delta = radius_m * (1.0 + BUFFER_PAD) / mean_radius();
    if delta >= PI {
        return Ok(BoundingBox::world());
    }

    let lat = center.lat.to_radians();
    let lon = center.lon.to_radians();
    let min_lat = lat - delta;
    let max_lat = lat + delta;

    let bbox = if max_lat >= FRAC_PI_2 || min_lat <= -FRAC_PI_2 {
        BoundingBox::new(
            -180.0,
            min_lat.max(-FRAC_PI_2).to_degrees(),
            180.0,
            max_lat.min(FRAC_PI_2).to_degrees(),
        )
    } else {
        let ratio = (delta.sin() / lat.cos()).min(1.0);
        let delta_lon = ratio.asin();
        let (min_lon, max_lon) = (lon - delta_lon, lon + delta_lon);

        if min_lon < -PI || max_lon > PI {
            BoundingBox::new(-180.0, min_lat.to_degrees(), 180.0, max_lat.to_degrees())
        } else {
            BoundingBox::new(
                min_lon.to_degrees(),
                min_lat.to_degrees(),
                max_lon.to_degrees(),
                max_lat.to_degrees(),
            )
        }
    };

    if !bbox.is_finite() {
        return Err(GeopinError::Geometry(format!(
            "Non-finite buffer box for {} radius {}",
            center, radius_m
        )));
    }

    Ok(bbox)
}

/// Total length of a path in meters.
pub fn path_length(path: &[Location], metric: DistanceMetric) -> f64 {
    path.windows(2)
        .map(|pair| distance(&pair[0], &pair[1], metric))
        .sum()
}

/// Point at `fraction` of the great circle from `a` to `b`.
fn intermediate_point(a: &Location, b: &Location, fraction: f64) -> Location {
    if fraction <= 0.0 {
        return *a;
    }

    let (lat1, lon1) = (a.lat.to_radians(), a.lon.to_radians());
    let (lat2, lon2) = (b.lat.to_radians(), b.lon.to_radians());

    let angular = Haversine.distance(a.to_point(), b.to_point()) / mean_radius();
    if angular.abs() < 1e-12 {
        return *a;
    }

    let sin_angular = angular.sin();
    let wa = ((1.0 - fraction) * angular).sin() / sin_angular;
    let wb = (fraction * angular).sin() / sin_angular;

    let x = wa * lat1.cos() * lon1.cos() + wb * lat2.cos() * lon2.cos();
    let y = wa * lat1.cos() * lon1.sin() + wb * lat2.cos() * lon2.sin();
    let z = wa * lat1.sin() + wb * lat2.sin();

    let lat = z.atan2((x * x + y * y).sqrt()).to_degrees();
    let lon = y.atan2(x).to_degrees();

    Location {
        lat: lat.clamp(-90.0, 90.0),
        lon: lon.clamp(-180.0, 180.0),
    }
}

/// Sample a path every `interval_m` meters from its start, always including
/// the final vertex.
///
/// Interpolation follows great circles between consecutive vertices. A path
/// of a single point, zero length, or a non-positive interval yields just the
/// first point.
///
/// # Examples
///
/// ```rust
/// use geopin::compute::sample_path;
/// use geopin_types::Location;
///
/// let path = [Location { lat: 0.0, lon: 0.0 }, Location { lat: 0.0, lon: 0.01 }];
/// let samples = sample_path(&path, 250.0);
/// // ~1113 m long: 0, 250, 500, 750, 1000 and the endpoint
/// assert_eq!(samples.len(), 6);
/// ```
pub fn sample_path(path: &[Location], interval_m: f64) -> Vec<Location> {
    let Some(first) = path.first() else {
        return Vec::new();
    };

    if path.len() == 1 || !interval_m.is_finite() || interval_m <= 0.0 {
        return vec![*first];
    }

    let mut samples = Vec::new();
    let mut target = 0.0;
    let mut walked = 0.0;

    for pair in path.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let segment = Haversine.distance(a.to_point(), b.to_point());

        while target <= walked + segment {
            let fraction = if segment > 0.0 {
                (target - walked) / segment
            } else {
                0.0
            };
            samples.push(intermediate_point(a, b, fraction));
            target += interval_m;
        }

        walked += segment;
    }

    // Ends off the sampling grid still get a sample at the final vertex.
    let last_sampled = target - interval_m;
    if walked - last_sampled > 1.0
        && let Some(last) = path.last()
    {
        samples.push(*last);
    }

    samples
}

/// Grid key for a location rounded to `decimals` places (5 ≈ 1.1 m).
pub fn round_key(location: &Location, decimals: u32) -> (i64, i64) {
    let scale = 10f64.powi(decimals as i32);
    (
        (location.lat * scale).round() as i64,
        (location.lon * scale).round() as i64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(lat: f64, lon: f64) -> Location {
        Location { lat, lon }
    }

    #[test]
    fn test_distance_metrics_agree_closely() {
        let nyc = loc(40.7128, -74.0060);
        let la = loc(34.0522, -118.2437);

        let haversine = distance(&nyc, &la, DistanceMetric::Haversine);
        let geodesic = distance(&nyc, &la, DistanceMetric::Geodesic);

        assert!(haversine > 3_900_000.0 && haversine < 4_000_000.0);
        assert!((haversine - geodesic).abs() < 10_000.0);
    }

    #[test]
    fn test_buffer_bbox_covers_cardinal_points() {
        let center = loc(51.5074, -0.1278);
        let bbox = buffer_bbox(&center, 1000.0).unwrap();

        // 1 km north/south is ~0.009 degrees of latitude
        assert!(bbox.north - center.lat > 0.0089);
        assert!(center.lat - bbox.south > 0.0089);
        // and ~0.0144 degrees of longitude at London's latitude
        assert!(bbox.east - center.lon > 0.0143);
        assert!(center.lon - bbox.west > 0.0143);
    }

    #[test]
    fn test_buffer_bbox_widens_with_latitude() {
        let equator = buffer_bbox(&loc(0.0, 10.0), 5000.0).unwrap();
        let arctic = buffer_bbox(&loc(70.0, 10.0), 5000.0).unwrap();

        let equator_width = equator.east - equator.west;
        let arctic_width = arctic.east - arctic.west;
        assert!(arctic_width > equator_width * 2.5);
    }

    #[test]
    fn test_buffer_bbox_at_pole_spans_all_longitudes() {
        let bbox = buffer_bbox(&loc(90.0, 0.0), 1000.0).unwrap();
        assert_eq!(bbox.west, -180.0);
        assert_eq!(bbox.east, 180.0);
        assert_eq!(bbox.north, 90.0);
    }

    #[test]
    fn test_buffer_bbox_near_antimeridian() {
        let bbox = buffer_bbox(&loc(-17.0, 179.999), 5000.0).unwrap();
        assert_eq!(bbox.west, -180.0);
        assert_eq!(bbox.east, 180.0);
    }

    #[test]
    fn test_buffer_bbox_rejects_bad_input() {
        assert!(buffer_bbox(&loc(0.0, 0.0), 0.0).is_err());
        assert!(buffer_bbox(&loc(0.0, 0.0), f64::NAN).is_err());
        assert!(buffer_bbox(&loc(100.0, 0.0), 10.0).is_err());
    }

    #[test]
    fn test_huge_radius_is_world() {
        let bbox = buffer_bbox(&loc(0.0, 0.0), 30_000_000.0).unwrap();
        assert_eq!(bbox, BoundingBox::world());
    }

    #[test]
    fn test_sample_straight_path() {
        // ~10 km due east along the equator
        let end_lon = 10_000.0 / (mean_radius() * PI / 180.0);
        let path = [loc(0.0, 0.0), loc(0.0, end_lon)];

        let samples = sample_path(&path, 1000.0);
        assert_eq!(samples.len(), 11);
        assert_eq!(samples[0], path[0]);

        let last = samples.last().unwrap();
        assert!(distance(last, &path[1], DistanceMetric::Haversine) < 1.0);

        for pair in samples.windows(2) {
            let step = distance(&pair[0], &pair[1], DistanceMetric::Haversine);
            assert!((step - 1000.0).abs() < 1.0, "step was {}", step);
        }
    }

    #[test]
    fn test_sample_multi_segment_path() {
        let path = [loc(51.50, -0.12), loc(51.51, -0.12), loc(51.51, -0.10)];
        let length = path_length(&path, DistanceMetric::Haversine);
        let samples = sample_path(&path, 200.0);

        let expected = (length / 200.0).floor() as usize + 1;
        assert!(samples.len() == expected || samples.len() == expected + 1);
        assert!(distance(samples.last().unwrap(), &path[2], DistanceMetric::Haversine) < 1.0);
    }

    #[test]
    fn test_sample_degenerate_paths() {
        assert!(sample_path(&[], 100.0).is_empty());
        assert_eq!(sample_path(&[loc(1.0, 1.0)], 100.0).len(), 1);
        assert_eq!(sample_path(&[loc(1.0, 1.0), loc(1.0, 1.0)], 0.0).len(), 1);
    }

    #[test]
    fn test_round_key() {
        let a = loc(51.507_401, -0.127_801);
        let b = loc(51.507_404, -0.127_798);
        let c = loc(51.507_5, -0.127_8);
        assert_eq!(round_key(&a, 5), round_key(&b, 5));
        assert_ne!(round_key(&a, 5), round_key(&c, 5));
    }
}
