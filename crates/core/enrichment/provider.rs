//! External collaborators used by the enrichment pipeline.
//!
//! The engine only talks to these traits; concrete HTTP adapters live in the
//! server crate and test doubles implement them directly.

use crate::error::Result;
use async_trait::async_trait;
use geopin_types::{Category, Location};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mode of travel for routing and straight-line fallbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelProfile {
    #[default]
    Driving,
    Cycling,
    Walking,
}

impl TravelProfile {
    /// Average speed used to estimate durations when no router is available.
    pub fn average_speed_mps(&self) -> f64 {
        match self {
            TravelProfile::Driving => 13.9,
            TravelProfile::Cycling => 4.2,
            TravelProfile::Walking => 1.4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TravelProfile::Driving => "driving",
            TravelProfile::Cycling => "cycling",
            TravelProfile::Walking => "walking",
        }
    }
}

/// A routing request. `buffer_m` and `categories` steer the enrichment run
/// along the resulting polyline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub start: Location,
    pub end: Location,
    #[serde(default)]
    pub waypoints: Vec<Location>,
    #[serde(default)]
    pub profile: TravelProfile,
    #[serde(default)]
    pub buffer_m: Option<f64>,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl RouteRequest {
    pub fn new(start: Location, end: Location) -> Self {
        Self {
            start,
            end,
            waypoints: Vec::new(),
            profile: TravelProfile::default(),
            buffer_m: None,
            categories: Vec::new(),
        }
    }

    pub fn with_waypoints(mut self, waypoints: Vec<Location>) -> Self {
        self.waypoints = waypoints;
        self
    }

    pub fn with_profile(mut self, profile: TravelProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_buffer(mut self, buffer_m: f64) -> Self {
        self.buffer_m = Some(buffer_m);
        self
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }

    /// Start, waypoints and end in travel order.
    pub fn points(&self) -> Vec<Location> {
        let mut points = Vec::with_capacity(self.waypoints.len() + 2);
        points.push(self.start);
        points.extend(self.waypoints.iter().copied());
        points.push(self.end);
        points
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub polyline: Vec<Location>,
    pub distance_m: f64,
    pub duration_s: f64,
}

/// A point of interest as reported by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiResult {
    /// Provider-side identifier, when the provider has one
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub location: Location,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl PoiResult {
    pub fn new(name: impl Into<String>, location: Location) -> Self {
        Self {
            id: None,
            name: name.into(),
            location,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Marker category implied by OpenStreetMap-style tags.
    pub fn category(&self) -> Category {
        let tag = |key: &str| self.tags.get(key).map(String::as_str);

        if tag("historic").is_some() {
            return Category::Historical;
        }
        if matches!(tag("tourism"), Some("museum" | "gallery" | "artwork"))
            || matches!(tag("amenity"), Some("theatre" | "arts_centre" | "library" | "cinema"))
        {
            return Category::Cultural;
        }
        if matches!(tag("tourism"), Some("attraction" | "viewpoint"))
            || matches!(tag("man_made"), Some("tower" | "lighthouse" | "bridge"))
        {
            return Category::Landmark;
        }
        if tag("natural").is_some()
            || matches!(tag("leisure"), Some("park" | "nature_reserve" | "garden"))
        {
            return Category::Natural;
        }
        if matches!(tag("amenity"), Some("events_venue" | "conference_centre")) {
            return Category::Event;
        }
        Category::PointOfInterest
    }
}

/// A POI lookup around one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiQuery {
    pub location: Location,
    pub radius_m: f64,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Address {
    pub display_name: String,
    #[serde(default)]
    pub house_number: Option<String>,
    #[serde(default)]
    pub road: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postcode: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
}

#[async_trait]
pub trait RoutingProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn route(&self, request: &RouteRequest) -> Result<Route>;
}

#[async_trait]
pub trait PoiProvider: Send + Sync {
    fn name(&self) -> &str;

    /// POIs within `radius_m` of `location`. An empty `categories` slice
    /// means no category filter.
    async fn find_pois(
        &self,
        location: &Location,
        radius_m: f64,
        categories: &[String],
    ) -> Result<Vec<PoiResult>>;
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    fn name(&self) -> &str;

    async fn reverse(&self, location: &Location) -> Result<Address>;
}
