use crate::location::Location;
use geo::Rect;
use serde::{Deserialize, Serialize};

/// An axis-aligned box in degrees.
///
/// `west > east` describes a box crossing the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    /// Create a new bounding box.
    ///
    /// # Examples
    ///
    /// ```
    /// use geopin_types::bbox::BoundingBox;
    ///
    /// let soho = BoundingBox::new(-0.1410, 51.5106, -0.1290, 51.5170);
    /// assert!(!soho.crosses_antimeridian());
    /// ```
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// The whole globe.
    pub fn world() -> Self {
        Self::new(-180.0, -90.0, 180.0, 90.0)
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.west > self.east
    }

    pub fn is_finite(&self) -> bool {
        [self.west, self.south, self.east, self.north]
            .iter()
            .all(|v| v.is_finite())
    }

    /// Split into one or two non-wrapping rectangles `(min_lon, min_lat, max_lon, max_lat)`.
    pub fn parts(&self) -> Vec<[f64; 4]> {
        if self.crosses_antimeridian() {
            vec![
                [self.west, self.south, 180.0, self.north],
                [-180.0, self.south, self.east, self.north],
            ]
        } else {
            vec![[self.west, self.south, self.east, self.north]]
        }
    }

    pub fn contains(&self, location: &Location) -> bool {
        let in_lat = location.lat >= self.south && location.lat <= self.north;
        let in_lon = if self.crosses_antimeridian() {
            location.lon >= self.west || location.lon <= self.east
        } else {
            location.lon >= self.west && location.lon <= self.east
        };
        in_lat && in_lon
    }

    /// Convert a `geo::Rect` (never wrapping) into a box.
    pub fn from_rect(rect: Rect) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}
