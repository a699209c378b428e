//! The service container tying the engine together.
//!
//! A [`GeoContext`] owns one instance of every component (index, caches,
//! batch controller, enrichment pipeline, webhook dispatcher) plus the
//! external providers, all injected through [`GeoContextBuilder`]. There is
//! no global state; two contexts in one process share nothing.
//!
//! Job-level operations (route planning, enrichment, batches) report their
//! lifecycle to webhook subscribers. Events are queued and delivered in the
//! background, so they never slow down or fail the operation itself.

use crate::builder::GeoContextBuilder;
use crate::cache::{CacheStats, TtlCache, cache_key};
use crate::compute::validation::{validate_location, validate_path, validate_radius};
use crate::concurrency::{BatchOptions, BatchReport, ConcurrencyController};
use crate::config::Config;
use crate::enrichment::{
    Address, PlannedRoute, PoiCache, PoiQuery, PoiResult, ReverseGeocoder, RouteEnricher,
    RouteEnrichment, RoutePlanner, RouteRequest,
};
use crate::error::{GeopinError, Result};
use crate::index::{IndexStats, MarkerHit, SpatialIndex};
use crate::webhook::{DeliveryRecord, Webhook, WebhookDispatcher, WebhookEvent, WebhookStats};
use geo::Polygon;
use geopin_types::{Location, Marker};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Counters for both provider caches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextCacheStats {
    pub pois: CacheStats,
    pub addresses: CacheStats,
}

pub struct GeoContext {
    pub(crate) config: Config,
    pub(crate) index: Arc<SpatialIndex>,
    pub(crate) poi_cache: Arc<PoiCache>,
    pub(crate) address_cache: Arc<TtlCache<Address>>,
    pub(crate) batch: ConcurrencyController,
    pub(crate) enricher: Arc<RouteEnricher>,
    pub(crate) planner: RoutePlanner,
    pub(crate) geocoder: Arc<dyn ReverseGeocoder>,
    pub(crate) webhooks: WebhookDispatcher,
    pub(crate) sweepers: Vec<JoinHandle<()>>,
}

impl GeoContext {
    pub fn builder() -> GeoContextBuilder {
        GeoContextBuilder::new()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn index(&self) -> &Arc<SpatialIndex> {
        &self.index
    }

    // Pins

    /// Index a marker, superseding any marker with the same id.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a bad location or radius, `Geometry` when no
    /// bounding box can be computed for it.
    pub fn create_pin(&self, marker: Marker) -> Result<Marker> {
        marker.check()?;
        if !self.index.insert(marker.clone()) {
            return Err(GeopinError::Geometry(format!(
                "Could not compute a bounding box for pin '{}'",
                marker.id
            )));
        }
        Ok(marker)
    }

    pub fn remove_pin(&self, id: &str) -> bool {
        self.index.remove(id)
    }

    pub fn get_pin(&self, id: &str) -> Option<Marker> {
        self.index.get(id)
    }

    pub fn query_radius(&self, center: &Location, radius_m: f64) -> Result<Vec<MarkerHit>> {
        self.index.query_by_radius(center, radius_m)
    }

    pub fn query_bbox(&self, west: f64, south: f64, east: f64, north: f64) -> Result<Vec<Marker>> {
        self.index.query_by_bbox(west, south, east, north)
    }

    pub fn query_polygon(&self, polygon: &Polygon) -> Result<Vec<Marker>> {
        self.index.query_by_polygon(polygon)
    }

    pub fn nearest(&self, center: &Location, k: usize) -> Result<Vec<MarkerHit>> {
        self.index.nearest_k(center, k)
    }

    pub fn index_stats(&self) -> IndexStats {
        self.index.stats()
    }

    // Routes

    /// Plan and enrich a route, reporting `route.*` events.
    pub async fn plan_route(&self, request: &RouteRequest) -> Result<PlannedRoute> {
        let job_id = Uuid::new_v4().to_string();
        self.emit(
            WebhookEvent::RouteStarted,
            json!({
                "start": request.start,
                "end": request.end,
                "waypoints": request.waypoints.len(),
                "profile": request.profile.as_str(),
            }),
            &job_id,
        );

        match self.planner.plan(request).await {
            Ok(planned) => {
                self.emit(
                    WebhookEvent::RouteCompleted,
                    json!({
                        "distance_m": planned.route.distance_m,
                        "duration_s": planned.route.duration_s,
                        "fallback": planned.fallback,
                        "markers": planned.enrichment.markers.len(),
                        "failed_samples": planned.enrichment.failed_samples,
                    }),
                    &job_id,
                );
                Ok(planned)
            }
            Err(e) => {
                self.emit(WebhookEvent::RouteFailed, json!({ "error": e.to_string() }), &job_id);
                Err(e)
            }
        }
    }

    /// Enrich an existing path, reporting `enrichment.*` events. A missing
    /// buffer uses the configured default.
    pub async fn enrich_route(
        &self,
        path: &[Location],
        buffer_m: Option<f64>,
        categories: &[String],
    ) -> Result<RouteEnrichment> {
        let buffer_m = buffer_m.unwrap_or(self.config.enrichment.default_buffer_m);
        let job_id = Uuid::new_v4().to_string();
        self.emit(
            WebhookEvent::EnrichmentStarted,
            json!({ "points": path.len(), "buffer_m": buffer_m }),
            &job_id,
        );

        match self.enricher.enrich(path, buffer_m, categories).await {
            Ok(enrichment) => {
                self.emit(
                    WebhookEvent::EnrichmentCompleted,
                    json!({
                        "markers": enrichment.markers.len(),
                        "sample_count": enrichment.sample_count,
                        "failed_samples": enrichment.failed_samples,
                        "length_m": enrichment.length_m,
                    }),
                    &job_id,
                );
                Ok(enrichment)
            }
            Err(e) => {
                self.emit(
                    WebhookEvent::EnrichmentFailed,
                    json!({ "error": e.to_string() }),
                    &job_id,
                );
                Err(e)
            }
        }
    }

    // Providers

    /// Reverse geocode one location, cached by its 5-decimal coordinates.
    pub async fn reverse_geocode(&self, location: &Location) -> Result<Address> {
        validate_location(location)?;
        let key = address_cache_key(location);
        self.address_cache
            .wrap(&key, None, || self.geocoder.reverse(location))
            .await
    }

    /// POIs around one location, cached.
    pub async fn find_pois(
        &self,
        location: &Location,
        radius_m: f64,
        categories: &[String],
    ) -> Result<Vec<PoiResult>> {
        self.enricher.find_pois(location, radius_m, categories).await
    }

    // Batches

    /// Reverse geocode many locations with bounded concurrency, reporting
    /// `batch.*` events.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the batch is empty, larger than
    /// `batch.max_batch_size`, asks for a zero concurrency limit, or holds
    /// an invalid location. Per-location provider failures are reported in
    /// the batch, not here.
    pub async fn batch_reverse_geocode(
        &self,
        locations: Vec<Location>,
        options: BatchOptions,
    ) -> Result<BatchReport<Address, GeopinError>> {
        self.check_batch(locations.len(), &options)?;
        validate_path(&locations)?;

        let tasks: Vec<_> = locations
            .iter()
            .map(|location| move || self.reverse_geocode(location))
            .collect();
        self.run_batch("reverse_geocode", tasks, options).await
    }

    /// Run many POI lookups with bounded concurrency, reporting `batch.*`
    /// events.
    pub async fn batch_find_pois(
        &self,
        queries: Vec<PoiQuery>,
        options: BatchOptions,
    ) -> Result<BatchReport<Vec<PoiResult>, GeopinError>> {
        self.check_batch(queries.len(), &options)?;
        for query in &queries {
            validate_location(&query.location)?;
            validate_radius(query.radius_m)?;
        }

        let tasks: Vec<_> = queries
            .iter()
            .map(|q| move || self.find_pois(&q.location, q.radius_m, &q.categories))
            .collect();
        self.run_batch("find_pois", tasks, options).await
    }

    fn check_batch(&self, len: usize, options: &BatchOptions) -> Result<()> {
        options.validate()?;
        let max = self.config.batch.max_batch_size;
        if len == 0 {
            return Err(GeopinError::InvalidInput("Batch is empty".to_string()));
        }
        if len > max {
            return Err(GeopinError::InvalidInput(format!(
                "Batch of {} requests exceeds the maximum of {}",
                len, max
            )));
        }
        Ok(())
    }

    async fn run_batch<T, F, Fut>(
        &self,
        operation: &str,
        tasks: Vec<F>,
        options: BatchOptions,
    ) -> Result<BatchReport<T, GeopinError>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let job_id = Uuid::new_v4().to_string();
        let total = tasks.len();
        self.emit(
            WebhookEvent::BatchStarted,
            json!({ "operation": operation, "total": total }),
            &job_id,
        );

        let report = self.batch.run(tasks, options).await?;

        // A batch fails as a whole when nothing succeeded or fail-fast tripped.
        let event = if report.failed > 0 && (report.successful == 0 || options.fail_fast) {
            WebhookEvent::BatchFailed
        } else {
            WebhookEvent::BatchCompleted
        };
        self.emit(
            event,
            json!({
                "operation": operation,
                "total": total,
                "successful": report.successful,
                "failed": report.failed,
                "duration_ms": report.duration.as_millis() as u64,
            }),
            &job_id,
        );

        Ok(report)
    }

    // Webhooks

    pub fn register_webhook(
        &self,
        url: &str,
        events: impl IntoIterator<Item = WebhookEvent>,
        secret: Option<String>,
    ) -> Result<Webhook> {
        self.webhooks.registry().register(url, events, secret)
    }

    pub fn unregister_webhook(&self, id: &Uuid) -> bool {
        self.webhooks.unregister(id)
    }

    pub fn set_webhook_active(&self, id: &Uuid, active: bool) -> bool {
        self.webhooks.registry().set_active(id, active)
    }

    pub fn webhook(&self, id: &Uuid) -> Option<Webhook> {
        self.webhooks.registry().get(id)
    }

    pub fn webhooks(&self) -> Vec<Webhook> {
        self.webhooks.registry().list()
    }

    /// Queue an event for every active subscriber; returns the delivery ids.
    pub fn trigger_event(
        &self,
        event: WebhookEvent,
        data: serde_json::Value,
        correlation_id: Option<String>,
    ) -> Result<Vec<Uuid>> {
        self.webhooks.trigger(event, data, correlation_id)
    }

    pub fn deliveries(&self, webhook_id: &Uuid, limit: usize) -> Vec<DeliveryRecord> {
        self.webhooks.deliveries(webhook_id, limit)
    }

    pub fn webhook_stats(&self) -> WebhookStats {
        self.webhooks.stats()
    }

    pub fn cache_stats(&self) -> ContextCacheStats {
        ContextCacheStats {
            pois: self.poi_cache.stats(),
            addresses: self.address_cache.stats(),
        }
    }

    /// Drop expired entries from both caches now.
    pub fn purge_caches(&self) -> usize {
        self.poi_cache.purge_expired() + self.address_cache.purge_expired()
    }

    /// Stop the cache sweepers, then close the webhook queue and wait for
    /// queued deliveries to finish.
    pub async fn shutdown(&self) {
        for sweeper in &self.sweepers {
            sweeper.abort();
        }
        self.webhooks.shutdown().await;
        log::debug!("GeoContext shut down");
    }

    fn emit(&self, event: WebhookEvent, data: serde_json::Value, job_id: &str) {
        if let Err(e) = self.webhooks.trigger(event, data, Some(job_id.to_string())) {
            log::debug!("Not delivering {}: {}", event, e);
        }
    }
}

impl Drop for GeoContext {
    fn drop(&mut self) {
        for sweeper in &self.sweepers {
            sweeper.abort();
        }
    }
}

fn address_cache_key(location: &Location) -> String {
    let lat = format!("{:.5}", location.lat);
    let lon = format!("{:.5}", location.lon);
    cache_key("geocode", &[&lat, &lon])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_cache_key_rounds() {
        let a = Location::new(51.500001, -0.120001).unwrap();
        let b = Location::new(51.500004, -0.119996).unwrap();
        assert_eq!(address_cache_key(&a), "geocode:51.50000:-0.12000");
        assert_eq!(address_cache_key(&a), address_cache_key(&b));
    }
}
