//! Geographic location in WGS84 degrees.

use crate::error::TypeError;
use serde::{Deserialize, Serialize};

/// A latitude/longitude pair.
///
/// Note the field order: latitude first, matching how people read
/// coordinates. Conversions into `geo` types put longitude on the x axis.
///
/// # Examples
///
/// ```
/// use geopin_types::location::Location;
///
/// let london = Location::new(51.5074, -0.1278).unwrap();
/// assert_eq!(london.lat, 51.5074);
///
/// assert!(Location::new(91.0, 0.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    /// Create a location, rejecting non-finite or out-of-range values.
    pub fn new(lat: f64, lon: f64) -> Result<Self, TypeError> {
        let location = Self { lat, lon };
        location.check()?;
        Ok(location)
    }

    /// Check the range invariant. Deserialized values bypass `new`, so
    /// callers re-check at their entry points.
    pub fn check(&self) -> Result<(), TypeError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(TypeError::InvalidLatitude(self.lat));
        }
        if !self.lon.is_finite() || !(-180.0..=180.0).contains(&self.lon) {
            return Err(TypeError::InvalidLongitude(self.lon));
        }
        Ok(())
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.check().is_ok()
    }

    /// Convert to a `geo::Point` (x = longitude, y = latitude).
    #[inline]
    pub fn to_point(&self) -> geo::Point<f64> {
        geo::Point::new(self.lon, self.lat)
    }

    /// Build from a `geo::Point` (x = longitude, y = latitude).
    pub fn from_point(point: geo::Point<f64>) -> Result<Self, TypeError> {
        Self::new(point.y(), point.x())
    }
}

impl From<Location> for geo::Point<f64> {
    fn from(location: Location) -> Self {
        location.to_point()
    }
}

impl From<Location> for geo::Coord<f64> {
    fn from(location: Location) -> Self {
        geo::coord! { x: location.lon, y: location.lat }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_edges() {
        assert!(Location::new(90.0, 180.0).is_ok());
        assert!(Location::new(-90.0, -180.0).is_ok());
        assert!(Location::new(0.0, 0.0).is_ok());
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(
            Location::new(90.1, 0.0),
            Err(TypeError::InvalidLatitude(90.1))
        );
        assert_eq!(
            Location::new(0.0, -180.5),
            Err(TypeError::InvalidLongitude(-180.5))
        );
        assert!(Location::new(f64::NAN, 0.0).is_err());
        assert!(Location::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_point_axis_order() {
        let loc = Location::new(40.7128, -74.0060).unwrap();
        let point = loc.to_point();
        assert_eq!(point.x(), -74.0060);
        assert_eq!(point.y(), 40.7128);
        assert_eq!(Location::from_point(point).unwrap(), loc);
    }

    #[test]
    fn test_deserialized_value_is_rechecked() {
        let loc: Location = serde_json::from_str(r#"{"lat": 120.0, "lon": 0.0}"#).unwrap();
        assert!(!loc.is_valid());
    }
}
