//! R*-tree over marker bounding boxes.
//!
//! Each marker is stored as the geodesic buffer box of its activation circle.
//! Queries use the tree for envelope pruning and then refine candidates with
//! exact distance or containment tests. The box computed at insert time is
//! retained in the id map and reused on removal, so floating-point
//! recomputation can never cause a removal to miss.

use crate::compute::{DistanceMetric, buffer_bbox, distance};
use crate::error::Result;
use geo::{BoundingRect, Contains, Polygon};
use geopin_types::{BoundingBox, Location, Marker};
use rstar::{AABB, RTree, RTreeObject};
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::sync::Arc;

/// Tree entry: a marker's buffer box plus a shared reference to the marker.
#[derive(Debug, Clone)]
pub struct IndexedMarker {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub marker: Arc<Marker>,
}

impl IndexedMarker {
    fn new(bbox: BoundingBox, marker: Arc<Marker>) -> Self {
        Self {
            min_x: bbox.west,
            min_y: bbox.south,
            max_x: bbox.east,
            max_y: bbox.north,
            marker,
        }
    }
}

// Entries match by identity: the same marker id under the same stored box.
impl PartialEq for IndexedMarker {
    fn eq(&self, other: &Self) -> bool {
        self.marker.id == other.marker.id
            && self.min_x == other.min_x
            && self.min_y == other.min_y
            && self.max_x == other.max_x
            && self.max_y == other.max_y
    }
}

impl RTreeObject for IndexedMarker {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.min_x, self.min_y], [self.max_x, self.max_y])
    }
}

/// Statistics about the marker index.
///
/// `total_pins` and `index_size` must always be equal; a mismatch means an
/// insert/remove pair leaked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IndexStats {
    /// Markers tracked by id
    pub total_pins: usize,
    /// Entries in the R*-tree
    pub index_size: usize,
}

/// Single-owner marker index. See [`SpatialIndex`](super::SpatialIndex) for
/// the shared, lock-protected version.
pub struct MarkerTree {
    tree: RTree<IndexedMarker>,
    by_id: FxHashMap<String, IndexedMarker>,
    metric: DistanceMetric,
}

impl MarkerTree {
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            tree: RTree::new(),
            by_id: FxHashMap::default(),
            metric,
        }
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Index a marker, replacing any marker with the same id.
    ///
    /// Returns `false` (and indexes nothing) when the marker is invalid or
    /// its bounding box cannot be computed.
    pub fn insert(&mut self, marker: Marker) -> bool {
        if let Err(e) = marker.check() {
            log::warn!("Skipping marker '{}': {}", marker.id, e);
            return false;
        }

        let bbox = match buffer_bbox(&marker.location, marker.radius_m) {
            Ok(bbox) => bbox,
            Err(e) => {
                log::warn!("Skipping marker '{}': {}", marker.id, e);
                return false;
            }
        };

        if self.by_id.contains_key(&marker.id) {
            self.remove(&marker.id);
        }

        let entry = IndexedMarker::new(bbox, Arc::new(marker));
        self.tree.insert(entry.clone());
        self.by_id.insert(entry.marker.id.clone(), entry);
        true
    }

    /// Remove a marker by id using the box stored at insert time.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(entry) = self.by_id.remove(id) else {
            return false;
        };

        let removed = self.tree.remove(&entry).is_some();
        if !removed {
            log::error!("Marker '{}' was tracked but missing from the tree", id);
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<Arc<Marker>> {
        self.by_id.get(id).map(|entry| entry.marker.clone())
    }

    /// Markers within `radius_m` of `center`, nearest first.
    ///
    /// Uses envelope-based pruning followed by exact distance filtering.
    ///
    /// # Assumptions
    ///
    /// `center` and `radius_m` are validated by `buffer_bbox`; invalid input
    /// surfaces as an error.
    pub fn query_radius(
        &self,
        center: &Location,
        radius_m: f64,
    ) -> Result<Vec<(Arc<Marker>, f64)>> {
        let bbox = buffer_bbox(center, radius_m)?;

        let mut results: Vec<_> = self
            .candidates(&bbox)
            .filter_map(|entry| {
                let d = distance(center, &entry.marker.location, self.metric);
                (d.is_finite() && d <= radius_m).then(|| (entry.marker.clone(), d))
            })
            .collect();

        sort_by_distance(&mut results);
        Ok(results)
    }

    /// Markers whose buffer box intersects `bbox`. Approximate: there is no
    /// exact refinement step.
    pub fn query_bbox(&self, bbox: &BoundingBox) -> Vec<Arc<Marker>> {
        let mut seen = rustc_hash::FxHashSet::default();
        self.candidates(bbox)
            .filter(|entry| seen.insert(entry.marker.id.as_str()))
            .map(|entry| entry.marker.clone())
            .collect()
    }

    /// Markers whose location lies inside `polygon` (x = longitude).
    pub fn query_polygon(&self, polygon: &Polygon) -> Vec<Arc<Marker>> {
        let Some(rect) = polygon.bounding_rect() else {
            log::warn!("Polygon query skipped: polygon has no envelope");
            return Vec::new();
        };

        let envelope = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .filter(|entry| polygon.contains(&entry.marker.location.to_point()))
            .map(|entry| entry.marker.clone())
            .collect()
    }

    /// The `k` nearest markers to `center` by linear scan.
    ///
    /// Not tree-accelerated: O(n log n) per call. Fine for working sets of a
    /// few hundred thousand markers; larger sets want a radius-bounded query.
    pub fn nearest_k(&self, center: &Location, k: usize) -> Vec<(Arc<Marker>, f64)> {
        if k == 0 {
            return Vec::new();
        }

        let mut results: Vec<_> = self
            .by_id
            .values()
            .map(|entry| {
                let d = distance(center, &entry.marker.location, self.metric);
                (entry.marker.clone(), d)
            })
            .collect();

        sort_by_distance(&mut results);
        results.truncate(k);
        results
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Marker>> {
        self.by_id.values().map(|entry| &entry.marker)
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            total_pins: self.by_id.len(),
            index_size: self.tree.size(),
        }
    }

    pub fn clear(&mut self) {
        self.tree = RTree::new();
        self.by_id.clear();
    }

    fn candidates<'a>(&'a self, bbox: &BoundingBox) -> impl Iterator<Item = &'a IndexedMarker> + 'a {
        bbox.parts().into_iter().flat_map(move |[min_x, min_y, max_x, max_y]| {
            let envelope = AABB::from_corners([min_x, min_y], [max_x, max_y]);
            self.tree.locate_in_envelope_intersecting(&envelope)
        })
    }
}

impl Default for MarkerTree {
    fn default() -> Self {
        Self::new(DistanceMetric::default())
    }
}

fn sort_by_distance(results: &mut [(Arc<Marker>, f64)]) {
    results.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.id.cmp(&b.0.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn pin(id: &str, lat: f64, lon: f64) -> Marker {
        Marker::new(id, Location { lat, lon }, 25.0).unwrap()
    }

    #[test]
    fn test_insert_and_query_radius_sorted() {
        let mut tree = MarkerTree::default();
        tree.insert(pin("far", 51.5100, -0.1278));
        tree.insert(pin("near", 51.5075, -0.1278));
        tree.insert(pin("mid", 51.5085, -0.1278));

        let center = Location { lat: 51.5074, lon: -0.1278 };
        let results = tree.query_radius(&center, 500.0).unwrap();
        let ids: Vec<_> = results.iter().map(|(m, _)| m.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
        assert!(results.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn test_reinsert_supersedes() {
        let mut tree = MarkerTree::default();
        assert!(tree.insert(pin("a", 10.0, 10.0)));
        assert!(tree.insert(pin("a", 20.0, 20.0)));

        assert_eq!(tree.stats(), IndexStats { total_pins: 1, index_size: 1 });
        assert_eq!(tree.get("a").unwrap().location.lat, 20.0);

        let old = tree.query_radius(&Location { lat: 10.0, lon: 10.0 }, 1000.0).unwrap();
        assert!(old.is_empty());
    }

    #[test]
    fn test_invalid_marker_not_indexed() {
        let mut tree = MarkerTree::default();
        let mut bad = pin("bad", 0.0, 0.0);
        bad.radius_m = f64::NAN;
        assert!(!tree.insert(bad));
        assert_eq!(tree.stats().total_pins, 0);
    }

    #[test]
    fn test_remove_uses_stored_box() {
        let mut tree = MarkerTree::default();
        tree.insert(pin("a", 51.5074, -0.1278));
        tree.insert(pin("b", 51.5080, -0.1281));

        assert!(tree.remove("a"));
        assert!(!tree.remove("a"));
        assert!(!tree.remove("missing"));
        assert_eq!(tree.stats(), IndexStats { total_pins: 1, index_size: 1 });
    }

    #[test]
    fn test_query_bbox_across_antimeridian() {
        let mut tree = MarkerTree::default();
        tree.insert(pin("fiji", -17.7, 178.0));
        tree.insert(pin("samoa", -13.8, -172.0));
        tree.insert(pin("sydney", -33.9, 151.2));

        let bbox = BoundingBox::new(170.0, -25.0, -165.0, -10.0);
        let mut ids: Vec<_> = tree.query_bbox(&bbox).iter().map(|m| m.id.clone()).collect();
        ids.sort();
        assert_eq!(ids, vec!["fiji", "samoa"]);
    }

    #[test]
    fn test_query_polygon() {
        let mut tree = MarkerTree::default();
        tree.insert(pin("inside", 51.505, -0.125));
        tree.insert(pin("outside", 51.520, -0.125));

        let poly: Polygon = polygon![
            (x: -0.13, y: 51.50),
            (x: -0.12, y: 51.50),
            (x: -0.12, y: 51.51),
            (x: -0.13, y: 51.51),
            (x: -0.13, y: 51.50),
        ];

        let results = tree.query_polygon(&poly);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "inside");
    }

    #[test]
    fn test_nearest_k() {
        let mut tree = MarkerTree::default();
        tree.insert(pin("brooklyn", 40.6782, -73.9442));
        tree.insert(pin("queens", 40.7306, -73.9356));
        tree.insert(pin("la", 34.0522, -118.2437));

        let nyc = Location { lat: 40.7128, lon: -74.0060 };
        let nearest = tree.nearest_k(&nyc, 2);
        assert_eq!(nearest.len(), 2);
        assert!(nearest.iter().all(|(m, _)| m.id != "la"));
        assert!(tree.nearest_k(&nyc, 0).is_empty());
        assert_eq!(tree.nearest_k(&nyc, 10).len(), 3);
    }

    #[test]
    fn test_polar_query_doesnt_panic() {
        let mut tree = MarkerTree::default();
        tree.insert(pin("north_pole", 90.0, 0.0));
        tree.insert(pin("station", 89.99, 120.0));

        let results = tree.query_radius(&Location { lat: 90.0, lon: -45.0 }, 5000.0).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.id, "north_pole");
    }

    #[test]
    fn test_high_latitude_query_finds_east_west_neighbours() {
        let mut tree = MarkerTree::default();
        // ~2 km east of Tromsø
        tree.insert(pin("east", 69.6492, 19.0050));

        let center = Location { lat: 69.6492, lon: 18.9553 };
        let results = tree.query_radius(&center, 2100.0).unwrap();
        assert_eq!(results.len(), 1);
    }
}
