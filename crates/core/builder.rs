//! Builder for [`GeoContext`].
//!
//! The three providers are required; the webhook transport defaults to
//! [`HttpTransport`] with the configured request timeout.

use crate::cache::TtlCache;
use crate::concurrency::ConcurrencyController;
use crate::config::Config;
use crate::context::GeoContext;
use crate::enrichment::{PoiProvider, ReverseGeocoder, RouteEnricher, RoutePlanner, RoutingProvider};
use crate::error::{GeopinError, Result};
use crate::index::SpatialIndex;
use crate::webhook::{HttpTransport, WebhookDispatcher, WebhookTransport};
use std::sync::Arc;

#[derive(Default)]
pub struct GeoContextBuilder {
    config: Config,
    routing: Option<Arc<dyn RoutingProvider>>,
    pois: Option<Arc<dyn PoiProvider>>,
    geocoder: Option<Arc<dyn ReverseGeocoder>>,
    transport: Option<Arc<dyn WebhookTransport>>,
    index: Option<Arc<SpatialIndex>>,
}

impl GeoContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn routing(mut self, provider: Arc<dyn RoutingProvider>) -> Self {
        self.routing = Some(provider);
        self
    }

    pub fn poi_provider(mut self, provider: Arc<dyn PoiProvider>) -> Self {
        self.pois = Some(provider);
        self
    }

    pub fn geocoder(mut self, geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    /// Replace the HTTP transport used for webhook deliveries.
    pub fn webhook_transport(mut self, transport: Arc<dyn WebhookTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Share an existing index instead of creating an empty one. Its metric
    /// wins over `index.metric` in the config.
    pub fn index(mut self, index: Arc<SpatialIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Build the context. Must run inside a tokio runtime: the webhook
    /// worker and cache sweepers are spawned here.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when the config does not validate, a provider is
    /// missing, or no runtime is available.
    pub fn build(self) -> Result<GeoContext> {
        self.config.validate().map_err(GeopinError::InvalidConfig)?;

        let routing = self.routing.ok_or_else(|| missing("routing provider"))?;
        let pois = self.pois.ok_or_else(|| missing("POI provider"))?;
        let geocoder = self.geocoder.ok_or_else(|| missing("reverse geocoder"))?;
        let config = self.config;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(config.webhooks.request_timeout())?),
        };
        let webhooks = WebhookDispatcher::start(config.webhooks.clone(), transport)?;

        let index = self
            .index
            .unwrap_or_else(|| Arc::new(SpatialIndex::new(config.index.metric)));
        let poi_cache = Arc::new(TtlCache::from_config(&config.cache));
        let address_cache = Arc::new(TtlCache::from_config(&config.cache));

        let mut sweepers = Vec::new();
        if let Some(interval) = config.cache.sweep_interval() {
            sweepers.push(poi_cache.spawn_sweeper(interval));
            sweepers.push(address_cache.spawn_sweeper(interval));
        }

        let enricher = Arc::new(RouteEnricher::new(
            index.clone(),
            poi_cache.clone(),
            pois,
            config.enrichment.clone(),
            config.index.default_pin_radius_m,
        )?);
        let planner = RoutePlanner::new(routing, enricher.clone());
        let batch = ConcurrencyController::new(config.batch.max_concurrency)?;

        log::debug!(
            "GeoContext ready: metric {:?}, batch concurrency {}, cache ttl {:?}",
            index.metric(),
            config.batch.max_concurrency,
            config.cache.default_ttl()
        );

        Ok(GeoContext {
            config,
            index,
            poi_cache,
            address_cache,
            batch,
            enricher,
            planner,
            geocoder,
            webhooks,
            sweepers,
        })
    }
}

fn missing(what: &str) -> GeopinError {
    GeopinError::InvalidConfig(format!("GeoContext needs a {}", what))
}
