//! Spatial index of markers.
//!
//! [`SpatialIndex`] is the shared, thread-safe entry point. A single
//! `RwLock` guards the tree and the id map together, so readers never see
//! one updated without the other and concurrent inserts of the same id
//! cannot leave a stale tree entry behind.

pub mod rtree;

pub use rtree::{IndexStats, IndexedMarker, MarkerTree};

use crate::compute::validation::{validate_location, validate_polygon, validate_radius};
use crate::compute::DistanceMetric;
use crate::error::{GeopinError, Result};
use geo::Polygon;
use geopin_types::{BoundingBox, Location, Marker};
use parking_lot::RwLock;
use std::sync::Arc;

/// A marker returned from a proximity query with its distance to the query
/// center.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MarkerHit {
    pub marker: Marker,
    pub distance_m: f64,
}

/// Thread-safe marker index.
///
/// Reads take a shared lock and may run in parallel; writes are exclusive.
/// Query results are owned copies, so no lock is held once a method returns.
pub struct SpatialIndex {
    inner: RwLock<MarkerTree>,
}

impl SpatialIndex {
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            inner: RwLock::new(MarkerTree::new(metric)),
        }
    }

    pub fn metric(&self) -> DistanceMetric {
        self.inner.read().metric()
    }

    /// Insert or replace a marker. Invalid markers are logged and skipped;
    /// returns whether the marker was indexed.
    pub fn insert(&self, marker: Marker) -> bool {
        self.inner.write().insert(marker)
    }

    /// Insert many markers under one write lock. Returns how many were
    /// indexed.
    pub fn insert_many(&self, markers: impl IntoIterator<Item = Marker>) -> usize {
        let mut tree = self.inner.write();
        markers.into_iter().filter(|m| tree.insert(m.clone())).count()
    }

    pub fn remove(&self, id: &str) -> bool {
        self.inner.write().remove(id)
    }

    pub fn get(&self, id: &str) -> Option<Marker> {
        self.inner.read().get(id).map(|m| (*m).clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().get(id).is_some()
    }

    /// Markers within `radius_m` meters of `center`, ascending by distance.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an out-of-range center or a non-positive radius.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use geopin::index::SpatialIndex;
    /// use geopin::compute::DistanceMetric;
    /// use geopin_types::{Location, Marker};
    ///
    /// let index = SpatialIndex::new(DistanceMetric::Geodesic);
    /// let here = Location { lat: 51.5074, lon: -0.1278 };
    /// index.insert(Marker::new("pin", here, 50.0)?);
    ///
    /// let hits = index.query_by_radius(&here, 100.0)?;
    /// assert_eq!(hits.len(), 1);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn query_by_radius(&self, center: &Location, radius_m: f64) -> Result<Vec<MarkerHit>> {
        validate_location(center)?;
        validate_radius(radius_m)?;

        let tree = self.inner.read();
        let hits = tree
            .query_radius(center, radius_m)?
            .into_iter()
            .map(|(marker, distance_m)| MarkerHit {
                marker: (*marker).clone(),
                distance_m,
            })
            .collect();
        Ok(hits)
    }

    /// Markers whose buffer box intersects the given box. A `west` greater
    /// than `east` denotes a box crossing the antimeridian.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for out-of-range or non-finite bounds, or when `south`
    /// is north of `north`.
    pub fn query_by_bbox(&self, west: f64, south: f64, east: f64, north: f64) -> Result<Vec<Marker>> {
        let bbox = BoundingBox::new(west, south, east, north);
        if !bbox.is_finite() {
            return Err(GeopinError::InvalidInput(format!(
                "Bounding box must be finite: {:?}",
                bbox
            )));
        }
        validate_location(&Location { lat: south, lon: west })?;
        validate_location(&Location { lat: north, lon: east })?;
        if south > north {
            return Err(GeopinError::InvalidInput(format!(
                "Bounding box south ({}) is north of north ({})",
                south, north
            )));
        }

        Ok(collect_owned(self.inner.read().query_bbox(&bbox)))
    }

    /// Markers whose location falls inside `polygon`.
    pub fn query_by_polygon(&self, polygon: &Polygon) -> Result<Vec<Marker>> {
        validate_polygon(polygon)?;
        Ok(collect_owned(self.inner.read().query_polygon(polygon)))
    }

    /// The `k` markers nearest to `center`, ascending by distance.
    pub fn nearest_k(&self, center: &Location, k: usize) -> Result<Vec<MarkerHit>> {
        validate_location(center)?;
        let hits = self
            .inner
            .read()
            .nearest_k(center, k)
            .into_iter()
            .map(|(marker, distance_m)| MarkerHit {
                marker: (*marker).clone(),
                distance_m,
            })
            .collect();
        Ok(hits)
    }

    pub fn all(&self) -> Vec<Marker> {
        self.inner.read().iter().map(|m| (**m).clone()).collect()
    }

    pub fn stats(&self) -> IndexStats {
        self.inner.read().stats()
    }

    pub fn len(&self) -> usize {
        self.stats().total_pins
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(DistanceMetric::default())
    }
}

fn collect_owned(markers: Vec<Arc<Marker>>) -> Vec<Marker> {
    markers.into_iter().map(|m| (*m).clone()).collect()
}
