//! Radius-bounded location markers ("pins").

use crate::error::TypeError;
use crate::location::Location;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Closed set of marker categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[default]
    #[serde(rename = "poi")]
    PointOfInterest,
    Historical,
    Landmark,
    Event,
    Cultural,
    Natural,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::PointOfInterest,
        Category::Historical,
        Category::Landmark,
        Category::Event,
        Category::Cultural,
        Category::Natural,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PointOfInterest => "poi",
            Self::Historical => "historical",
            Self::Landmark => "landmark",
            Self::Event => "event",
            Self::Cultural => "cultural",
            Self::Natural => "natural",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category: {}", s))
    }
}

/// Free-form descriptive content attached to a marker.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarkerPayload {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    /// Optional fields (opening hours, website, raw provider tags, ...)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

/// Where a marker came from and how fresh it is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub languages: Vec<String>,
}

impl Provenance {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            updated_at: Utc::now(),
            verified: false,
            languages: Vec::new(),
        }
    }
}

impl Default for Provenance {
    fn default() -> Self {
        Self::new("user")
    }
}

/// A radius-bounded point of interest or custom annotation.
///
/// Markers are treated as immutable once indexed: changing the location or
/// radius means removing and re-inserting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: String,
    pub location: Location,
    /// Activation radius in meters
    pub radius_m: f64,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub payload: MarkerPayload,
    #[serde(default)]
    pub provenance: Provenance,
}

impl Marker {
    /// Create a marker with an empty payload and user provenance.
    pub fn new(id: impl Into<String>, location: Location, radius_m: f64) -> Result<Self, TypeError> {
        Self::builder(id, location, radius_m).build()
    }

    pub fn builder(id: impl Into<String>, location: Location, radius_m: f64) -> MarkerBuilder {
        MarkerBuilder {
            marker: Marker {
                id: id.into(),
                location,
                radius_m,
                category: Category::default(),
                payload: MarkerPayload::default(),
                provenance: Provenance::default(),
            },
        }
    }

    /// Check the id, location and radius invariants.
    pub fn check(&self) -> Result<(), TypeError> {
        if self.id.is_empty() {
            return Err(TypeError::EmptyId);
        }
        self.location.check()?;
        if !self.radius_m.is_finite() || self.radius_m <= 0.0 {
            return Err(TypeError::InvalidRadius(self.radius_m));
        }
        Ok(())
    }
}

/// Builder for [`Marker`].
#[derive(Debug, Clone)]
pub struct MarkerBuilder {
    marker: Marker,
}

impl MarkerBuilder {
    pub fn category(mut self, category: Category) -> Self {
        self.marker.category = category;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.marker.payload.name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.marker.payload.description = Some(description.into());
        self
    }

    pub fn payload(mut self, payload: MarkerPayload) -> Self {
        self.marker.payload = payload;
        self
    }

    pub fn provenance(mut self, provenance: Provenance) -> Self {
        self.marker.provenance = provenance;
        self
    }

    pub fn build(self) -> Result<Marker, TypeError> {
        self.marker.check()?;
        Ok(self.marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_wire_names() {
        let json = serde_json::to_string(&Category::PointOfInterest).unwrap();
        assert_eq!(json, "\"poi\"");
        let parsed: Category = serde_json::from_str("\"natural\"").unwrap();
        assert_eq!(parsed, Category::Natural);
        assert_eq!("landmark".parse::<Category>(), Ok(Category::Landmark));
        assert!("castle".parse::<Category>().is_err());
    }

    #[test]
    fn test_marker_rejects_bad_radius() {
        let loc = Location::new(0.0, 0.0).unwrap();
        assert_eq!(
            Marker::new("a", loc, 0.0),
            Err(TypeError::InvalidRadius(0.0))
        );
        assert!(Marker::new("a", loc, -5.0).is_err());
        assert!(Marker::new("a", loc, f64::NAN).is_err());
        assert_eq!(Marker::new("", loc, 5.0), Err(TypeError::EmptyId));
    }

    #[test]
    fn test_marker_json_defaults() {
        let json = r#"{"id": "m1", "location": {"lat": 1.0, "lon": 2.0}, "radius_m": 10.0}"#;
        let marker: Marker = serde_json::from_str(json).unwrap();
        assert_eq!(marker.category, Category::PointOfInterest);
        assert_eq!(marker.provenance.source, "user");
        assert!(marker.check().is_ok());
    }
}
