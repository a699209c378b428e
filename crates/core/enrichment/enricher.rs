//! Route enrichment: sample a path, look up POIs around each sample, merge
//! and deduplicate, then index the results as markers.

use super::provider::{PoiProvider, PoiResult};
use crate::cache::{TtlCache, cache_key};
use crate::compute::validation::{validate_location, validate_path, validate_radius};
use crate::compute::{DistanceMetric, path_length, round_key, sample_path};
use crate::concurrency::{BatchOptions, ConcurrencyController, TaskError};
use crate::config::EnrichmentConfig;
use crate::error::{GeopinError, Result};
use crate::index::SpatialIndex;
use geopin_types::{Location, Marker, MarkerPayload, Provenance};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome of enriching one path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEnrichment {
    /// Deduplicated markers, in discovery order, all present in the index
    pub markers: Vec<Marker>,
    pub sample_count: usize,
    /// Samples whose POI lookup failed and contributed nothing
    pub failed_samples: usize,
    pub sample_interval_m: f64,
    pub length_m: f64,
}

/// Cache shared by every POI lookup.
pub type PoiCache = TtlCache<Vec<PoiResult>>;

pub struct RouteEnricher {
    index: Arc<SpatialIndex>,
    cache: Arc<PoiCache>,
    controller: ConcurrencyController,
    provider: Arc<dyn PoiProvider>,
    config: EnrichmentConfig,
    marker_radius_m: f64,
}

impl RouteEnricher {
    pub fn new(
        index: Arc<SpatialIndex>,
        cache: Arc<PoiCache>,
        provider: Arc<dyn PoiProvider>,
        config: EnrichmentConfig,
        marker_radius_m: f64,
    ) -> Result<Self> {
        let controller = ConcurrencyController::new(config.max_concurrency)?;
        Ok(Self {
            index,
            cache,
            controller,
            provider,
            config,
            marker_radius_m,
        })
    }

    pub fn config(&self) -> &EnrichmentConfig {
        &self.config
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    fn metric(&self) -> DistanceMetric {
        self.index.metric()
    }

    /// Validate a buffer radius against the configured maximum.
    pub fn check_buffer(&self, buffer_m: f64) -> Result<()> {
        validate_radius(buffer_m)?;
        if buffer_m > self.config.max_buffer_m {
            return Err(GeopinError::InvalidInput(format!(
                "Buffer {} m exceeds the maximum of {} m",
                buffer_m, self.config.max_buffer_m
            )));
        }
        Ok(())
    }

    /// POIs around one location, served from the cache when possible.
    ///
    /// Provider errors are returned and not cached.
    pub async fn find_pois(
        &self,
        location: &Location,
        radius_m: f64,
        categories: &[String],
    ) -> Result<Vec<PoiResult>> {
        validate_location(location)?;
        validate_radius(radius_m)?;

        let key = poi_cache_key(location, radius_m, categories);
        self.cache
            .wrap(&key, None, || self.provider.find_pois(location, radius_m, categories))
            .await
    }

    /// Enrich `path` with POIs found within `buffer_m` of evenly spaced
    /// samples along it.
    ///
    /// The sample interval is the configured maximum, shortened so that
    /// short paths still get `samples_per_route` intervals. A failed lookup
    /// degrades to no POIs for that sample. Markers are inserted into the
    /// index as they are built; there is no rollback.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty or out-of-range path, or a bad buffer.
    pub async fn enrich(
        &self,
        path: &[Location],
        buffer_m: f64,
        categories: &[String],
    ) -> Result<RouteEnrichment> {
        validate_path(path)?;
        self.check_buffer(buffer_m)?;

        let length_m = path_length(path, self.metric());
        let interval = sample_interval(
            length_m,
            self.config.max_sample_interval_m,
            self.config.samples_per_route,
        );
        let samples = sample_path(path, interval);

        log::debug!(
            "Enriching {:.0} m path: {} samples every {:.1} m, buffer {} m",
            length_m,
            samples.len(),
            interval,
            buffer_m
        );

        let tasks: Vec<_> = samples
            .iter()
            .map(|sample| move || self.find_pois(sample, buffer_m, categories))
            .collect();
        let report = self.controller.run(tasks, BatchOptions::default()).await?;

        let mut failed_samples = 0;
        let mut seen = FxHashSet::default();
        let mut seen_ids = FxHashSet::default();
        let mut markers = Vec::new();

        for outcome in report.results {
            let pois = match outcome.result {
                Ok(pois) => pois,
                Err(TaskError::Failed(e)) => {
                    log::warn!("POI lookup for sample {} failed: {}", outcome.index, e);
                    failed_samples += 1;
                    continue;
                }
                Err(TaskError::Stopped) => {
                    failed_samples += 1;
                    continue;
                }
            };

            for poi in pois {
                if !seen.insert(round_key(&poi.location, self.config.dedup_decimals)) {
                    continue;
                }
                match poi_to_marker(&poi, self.marker_radius_m, self.provider.name()) {
                    // A repeated provider id would replace the earlier pin in the index.
                    Ok(marker) if seen_ids.contains(&marker.id) => {
                        log::debug!("Skipping duplicate POI id '{}'", marker.id);
                    }
                    Ok(marker) => {
                        if self.index.insert(marker.clone()) {
                            seen_ids.insert(marker.id.clone());
                            markers.push(marker);
                        }
                    }
                    Err(e) => log::warn!("Dropping POI '{}': {}", poi.name, e),
                }
            }
        }

        if failed_samples == samples.len() && !samples.is_empty() {
            log::warn!("Every POI lookup failed along the path; returning no markers");
        }

        Ok(RouteEnrichment {
            markers,
            sample_count: samples.len(),
            failed_samples,
            sample_interval_m: interval,
            length_m,
        })
    }
}

/// Distance between path samples for a path of `length_m`.
pub fn sample_interval(length_m: f64, max_interval_m: f64, samples_per_route: usize) -> f64 {
    if length_m <= 0.0 || samples_per_route == 0 {
        return max_interval_m;
    }
    max_interval_m.min(length_m / samples_per_route as f64)
}

pub fn poi_cache_key(location: &Location, radius_m: f64, categories: &[String]) -> String {
    let mut categories = categories.to_vec();
    categories.sort();
    categories.dedup();

    cache_key(
        "poi",
        &[
            &format!("{:.5}", location.lat),
            &format!("{:.5}", location.lon),
            &radius_m,
            &categories.join(","),
        ],
    )
}

/// Build an index marker from a provider POI.
///
/// Ids fall back to `poi_<lat>_<lon>` when the provider gives none.
pub fn poi_to_marker(poi: &PoiResult, radius_m: f64, source: &str) -> Result<Marker> {
    let id = poi
        .id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("poi_{:.5}_{:.5}", poi.location.lat, poi.location.lon));

    let mut payload = MarkerPayload {
        name: poi.name.clone(),
        categories: poi.tags.iter().map(|(k, v)| format!("{}={}", k, v)).collect(),
        ..MarkerPayload::default()
    };
    for (key, value) in &poi.tags {
        payload
            .extra
            .insert(key.clone(), serde_json::Value::String(value.clone()));
    }

    let marker = Marker::builder(id, poi.location, radius_m)
        .category(poi.category())
        .payload(payload)
        .provenance(Provenance::new(source))
        .build()?;
    Ok(marker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use geopin_types::Category;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Returns the same POIs for every location; optionally fails.
    struct FixedPois {
        pois: Vec<PoiResult>,
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PoiProvider for FixedPois {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn find_pois(&self, _: &Location, _: f64, _: &[String]) -> Result<Vec<PoiResult>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(GeopinError::provider("fixed", "unavailable"));
            }
            Ok(self.pois.clone())
        }
    }

    fn enricher(provider: Arc<FixedPois>) -> (RouteEnricher, Arc<SpatialIndex>) {
        let index = Arc::new(SpatialIndex::default());
        let cache = Arc::new(PoiCache::new(Duration::from_secs(60), 1000));
        let enricher = RouteEnricher::new(
            index.clone(),
            cache,
            provider,
            EnrichmentConfig::default(),
            50.0,
        )
        .unwrap();
        (enricher, index)
    }

    fn ten_km_path() -> Vec<Location> {
        vec![Location { lat: 0.0, lon: 0.0 }, Location { lat: 0.0, lon: 0.0899 }]
    }

    #[tokio::test]
    async fn test_overlapping_samples_dedup() {
        let museum = PoiResult::new("Museum", Location { lat: 0.0, lon: 0.045 })
            .with_id("node/1")
            .with_tag("tourism", "museum");
        // Same place rounded to 5 decimals, different provider id
        let duplicate = PoiResult::new("Museum (dup)", Location { lat: 0.000_001, lon: 0.045_001 })
            .with_id("node/2");

        let provider = Arc::new(FixedPois {
            pois: vec![museum, duplicate],
            fail: false,
            calls: AtomicUsize::new(0),
        });
        let (enricher, index) = enricher(provider.clone());

        let result = enricher.enrich(&ten_km_path(), 500.0, &[]).await.unwrap();

        assert!(result.sample_count >= 10);
        assert_eq!(result.failed_samples, 0);
        assert_eq!(result.markers.len(), 1);
        assert_eq!(result.markers[0].id, "node/1");
        assert_eq!(result.markers[0].category, Category::Cultural);
        assert_eq!(result.markers[0].provenance.source, "fixed");
        assert!(index.get("node/1").is_some());
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_provider_id_kept_once() {
        let gate = PoiResult::new("City Gate", Location { lat: 0.0, lon: 0.02 }).with_id("way/7");
        // Same id, centroid reported elsewhere
        let moved = PoiResult::new("City Gate", Location { lat: 0.0, lon: 0.06 }).with_id("way/7");

        let provider = Arc::new(FixedPois {
            pois: vec![gate, moved],
            fail: false,
            calls: AtomicUsize::new(0),
        });
        let (enricher, index) = enricher(provider);

        let result = enricher.enrich(&ten_km_path(), 500.0, &[]).await.unwrap();

        assert_eq!(result.markers.len(), 1);
        assert_eq!(index.len(), 1);
        let indexed = index.get("way/7").unwrap();
        assert_eq!(indexed.location, result.markers[0].location);
        assert_eq!(indexed.location.lon, 0.02);
    }

    #[tokio::test]
    async fn test_total_outage_degrades_to_empty() {
        let provider = Arc::new(FixedPois {
            pois: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        });
        let (enricher, index) = enricher(provider.clone());

        let result = enricher.enrich(&ten_km_path(), 500.0, &[]).await.unwrap();

        assert!(result.markers.is_empty());
        assert_eq!(result.failed_samples, result.sample_count);
        assert_eq!(provider.calls.load(Ordering::SeqCst), result.sample_count);
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_lookups_are_cached() {
        let provider = Arc::new(FixedPois {
            pois: vec![PoiResult::new("Cafe", Location { lat: 0.0, lon: 0.01 })],
            fail: false,
            calls: AtomicUsize::new(0),
        });
        let (enricher, _) = enricher(provider.clone());
        let here = Location { lat: 0.0, lon: 0.01 };

        let first = enricher.find_pois(&here, 200.0, &["cafe".to_string()]).await.unwrap();
        let second = enricher.find_pois(&here, 200.0, &["cafe".to_string()]).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_input_rejected() {
        let provider = Arc::new(FixedPois {
            pois: Vec::new(),
            fail: false,
            calls: AtomicUsize::new(0),
        });
        let (enricher, _) = enricher(provider);

        assert!(enricher.enrich(&[], 100.0, &[]).await.unwrap_err().is_validation());
        assert!(enricher.enrich(&ten_km_path(), 0.0, &[]).await.is_err());
        assert!(enricher.enrich(&ten_km_path(), 50_000.0, &[]).await.is_err());
    }

    #[test]
    fn test_sample_interval() {
        assert_eq!(sample_interval(50_000.0, 1000.0, 10), 1000.0);
        assert_eq!(sample_interval(2_000.0, 1000.0, 10), 200.0);
        assert_eq!(sample_interval(0.0, 1000.0, 10), 1000.0);
    }

    #[test]
    fn test_poi_marker_fallback_id() {
        let poi = PoiResult::new("Unnamed", Location { lat: 51.5, lon: -0.12 });
        let marker = poi_to_marker(&poi, 50.0, "overpass").unwrap();
        assert_eq!(marker.id, "poi_51.50000_-0.12000");
        assert_eq!(marker.radius_m, 50.0);
    }

    #[test]
    fn test_cache_key_ignores_category_order() {
        let here = Location { lat: 1.0, lon: 2.0 };
        let a = poi_cache_key(&here, 100.0, &["b".to_string(), "a".to_string()]);
        let b = poi_cache_key(&here, 100.0, &["a".to_string(), "b".to_string()]);
        assert_eq!(a, b);
    }
}
