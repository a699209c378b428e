//! Validation for geographic inputs.

use crate::error::{GeopinError, Result};
use geo::Polygon;
use geopin_types::Location;

/// Validates a location has finite, in-range latitude and longitude.
///
/// Latitude: [-90.0, 90.0], Longitude: [-180.0, 180.0]
///
/// # Examples
///
/// ```
/// use geopin::compute::validation::validate_location;
/// use geopin_types::Location;
///
/// let london = Location { lat: 51.5074, lon: -0.1278 };
/// assert!(validate_location(&london).is_ok());
///
/// let invalid = Location { lat: 95.0, lon: 0.0 };
/// assert!(validate_location(&invalid).is_err());
/// ```
pub fn validate_location(location: &Location) -> Result<()> {
    location.check().map_err(GeopinError::from)
}

/// Validates a search or activation radius in meters.
pub fn validate_radius(radius_m: f64) -> Result<()> {
    if !radius_m.is_finite() {
        return Err(GeopinError::InvalidInput(format!(
            "Radius must be finite, got: {}",
            radius_m
        )));
    }

    if radius_m <= 0.0 {
        return Err(GeopinError::InvalidInput(format!(
            "Radius must be greater than zero, got: {}",
            radius_m
        )));
    }

    Ok(())
}

/// Validates every vertex of a path. Empty paths are rejected.
pub fn validate_path(path: &[Location]) -> Result<()> {
    if path.is_empty() {
        return Err(GeopinError::InvalidInput(
            "Path must contain at least one point".to_string(),
        ));
    }

    for (idx, location) in path.iter().enumerate() {
        validate_location(location)
            .map_err(|e| GeopinError::InvalidInput(format!("Point at index {}: {}", idx, e)))?;
    }
    Ok(())
}

/// Validates all polygon coordinates (exterior and interior rings).
///
/// Polygon coordinates follow `geo` conventions: x is longitude, y latitude.
///
/// # Examples
///
/// ```
/// use geopin::compute::validation::validate_polygon;
/// use geo::{polygon, Polygon};
///
/// let poly: Polygon = polygon![
///     (x: -0.13, y: 51.50),
///     (x: -0.12, y: 51.50),
///     (x: -0.12, y: 51.51),
///     (x: -0.13, y: 51.51),
///     (x: -0.13, y: 51.50),
/// ];
///
/// assert!(validate_polygon(&poly).is_ok());
/// ```
pub fn validate_polygon(polygon: &Polygon) -> Result<()> {
    if polygon.exterior().0.len() < 4 {
        return Err(GeopinError::InvalidInput(
            "Polygon exterior ring needs at least three distinct vertices".to_string(),
        ));
    }

    for (idx, coord) in polygon.exterior().coords().enumerate() {
        let location = Location {
            lat: coord.y,
            lon: coord.x,
        };
        validate_location(&location).map_err(|e| {
            GeopinError::InvalidInput(format!("Exterior ring point at index {}: {}", idx, e))
        })?;
    }

    for (ring_idx, interior) in polygon.interiors().iter().enumerate() {
        for (idx, coord) in interior.coords().enumerate() {
            let location = Location {
                lat: coord.y,
                lon: coord.x,
            };
            validate_location(&location).map_err(|e| {
                GeopinError::InvalidInput(format!(
                    "Interior ring {} point at index {}: {}",
                    ring_idx, idx, e
                ))
            })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn test_valid_locations() {
        for (lat, lon) in [(51.5074, -0.1278), (90.0, 0.0), (-90.0, 180.0), (0.0, -180.0)] {
            assert!(validate_location(&Location { lat, lon }).is_ok());
        }
    }

    #[test]
    fn test_invalid_locations() {
        for (lat, lon) in [(90.1, 0.0), (0.0, 180.1), (f64::NAN, 0.0), (0.0, f64::INFINITY)] {
            let err = validate_location(&Location { lat, lon }).unwrap_err();
            assert!(err.is_validation());
        }
    }

    #[test]
    fn test_radius() {
        assert!(validate_radius(1.0).is_ok());
        assert!(validate_radius(0.0).is_err());
        assert!(validate_radius(-1.0).is_err());
        assert!(validate_radius(f64::NAN).is_err());
    }

    #[test]
    fn test_path() {
        assert!(validate_path(&[]).is_err());

        let path = vec![
            Location { lat: 51.5, lon: -0.1 },
            Location { lat: 151.5, lon: -0.1 },
        ];
        let err = validate_path(&path).unwrap_err();
        assert!(err.to_string().contains("index 1"));
    }

    #[test]
    fn test_validate_polygon() {
        let valid: Polygon = polygon![
            (x: -80.0, y: 35.0),
            (x: -70.0, y: 35.0),
            (x: -70.0, y: 45.0),
            (x: -80.0, y: 35.0),
        ];
        assert!(validate_polygon(&valid).is_ok());

        let invalid: Polygon = polygon![
            (x: -80.0, y: 35.0),
            (x: 999.0, y: 35.0),
            (x: -70.0, y: 45.0),
            (x: -80.0, y: 35.0),
        ];
        assert!(validate_polygon(&invalid).is_err());
    }
}
