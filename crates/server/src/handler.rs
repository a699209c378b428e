//! Handler implementation for the geopin RPC service

use crate::protocol::{BatchResponse, GeoService, ServerStats};
use crate::transport::rpc::ConnectionTracker;
use geo::{LineString, Polygon};
use geopin::enrichment::{Address, PlannedRoute, PoiResult, RouteEnrichment, RouteRequest};
use geopin::index::{IndexStats, MarkerHit};
use geopin::webhook::{DeliveryRecord, Webhook, WebhookEvent, WebhookStats};
use geopin::{BatchOptions, ContextCacheStats, GeoContext, GeopinError, PoiQuery};
use geopin_types::{Location, Marker};
use std::sync::Arc;
use tarpc::context;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct Handler {
    ctx: Arc<GeoContext>,
    connections: Arc<ConnectionTracker>,
}

impl Handler {
    pub fn new(ctx: Arc<GeoContext>, connections: Arc<ConnectionTracker>) -> Self {
        Self { ctx, connections }
    }
}

fn to_wire(op: &str) -> impl Fn(GeopinError) -> String + '_ {
    move |e| {
        if e.is_validation() {
            debug!("{} rejected: {}", op, e);
        } else {
            warn!("{} failed: {}", op, e);
        }
        e.to_string()
    }
}

impl GeoService for Handler {
    async fn create_pin(self, _: context::Context, marker: Marker) -> Result<Marker, String> {
        self.ctx.create_pin(marker).map_err(to_wire("create_pin"))
    }

    async fn remove_pin(self, _: context::Context, id: String) -> bool {
        self.ctx.remove_pin(&id)
    }

    async fn get_pin(self, _: context::Context, id: String) -> Option<Marker> {
        self.ctx.get_pin(&id)
    }

    async fn query_radius(
        self,
        _: context::Context,
        center: Location,
        radius_m: f64,
    ) -> Result<Vec<MarkerHit>, String> {
        self.ctx
            .query_radius(&center, radius_m)
            .map_err(to_wire("query_radius"))
    }

    async fn query_bbox(
        self,
        _: context::Context,
        west: f64,
        south: f64,
        east: f64,
        north: f64,
    ) -> Result<Vec<Marker>, String> {
        self.ctx
            .query_bbox(west, south, east, north)
            .map_err(to_wire("query_bbox"))
    }

    async fn query_polygon(
        self,
        _: context::Context,
        exterior: Vec<Location>,
    ) -> Result<Vec<Marker>, String> {
        if exterior.len() < 3 {
            return Err("Polygon needs at least 3 vertices".to_string());
        }
        let ring: LineString<f64> = exterior.iter().map(|l| (l.lon, l.lat)).collect();
        let polygon = Polygon::new(ring, Vec::new());
        self.ctx
            .query_polygon(&polygon)
            .map_err(to_wire("query_polygon"))
    }

    async fn nearest(
        self,
        _: context::Context,
        center: Location,
        k: usize,
    ) -> Result<Vec<MarkerHit>, String> {
        self.ctx.nearest(&center, k).map_err(to_wire("nearest"))
    }

    async fn index_stats(self, _: context::Context) -> IndexStats {
        self.ctx.index_stats()
    }

    async fn plan_route(
        self,
        _: context::Context,
        request: RouteRequest,
    ) -> Result<PlannedRoute, String> {
        self.ctx
            .plan_route(&request)
            .await
            .map_err(to_wire("plan_route"))
    }

    async fn enrich_route(
        self,
        _: context::Context,
        path: Vec<Location>,
        buffer_m: Option<f64>,
        categories: Vec<String>,
    ) -> Result<RouteEnrichment, String> {
        self.ctx
            .enrich_route(&path, buffer_m, &categories)
            .await
            .map_err(to_wire("enrich_route"))
    }

    async fn reverse_geocode(
        self,
        _: context::Context,
        location: Location,
    ) -> Result<Address, String> {
        self.ctx
            .reverse_geocode(&location)
            .await
            .map_err(to_wire("reverse_geocode"))
    }

    async fn find_pois(
        self,
        _: context::Context,
        location: Location,
        radius_m: f64,
        categories: Vec<String>,
    ) -> Result<Vec<PoiResult>, String> {
        self.ctx
            .find_pois(&location, radius_m, &categories)
            .await
            .map_err(to_wire("find_pois"))
    }

    async fn batch_reverse_geocode(
        self,
        _: context::Context,
        locations: Vec<Location>,
        options: BatchOptions,
    ) -> Result<BatchResponse<Address>, String> {
        self.ctx
            .batch_reverse_geocode(locations, options)
            .await
            .map(BatchResponse::from)
            .map_err(to_wire("batch_reverse_geocode"))
    }

    async fn batch_find_pois(
        self,
        _: context::Context,
        queries: Vec<PoiQuery>,
        options: BatchOptions,
    ) -> Result<BatchResponse<Vec<PoiResult>>, String> {
        self.ctx
            .batch_find_pois(queries, options)
            .await
            .map(BatchResponse::from)
            .map_err(to_wire("batch_find_pois"))
    }

    async fn register_webhook(
        self,
        _: context::Context,
        url: String,
        events: Vec<WebhookEvent>,
        secret: Option<String>,
    ) -> Result<Webhook, String> {
        self.ctx
            .register_webhook(&url, events, secret)
            .map_err(to_wire("register_webhook"))
    }

    async fn unregister_webhook(self, _: context::Context, id: Uuid) -> bool {
        self.ctx.unregister_webhook(&id)
    }

    async fn set_webhook_active(self, _: context::Context, id: Uuid, active: bool) -> bool {
        self.ctx.set_webhook_active(&id, active)
    }

    async fn list_webhooks(self, _: context::Context) -> Vec<Webhook> {
        self.ctx.webhooks()
    }

    async fn trigger_event(
        self,
        _: context::Context,
        event: WebhookEvent,
        data: serde_json::Value,
        correlation_id: Option<String>,
    ) -> Result<Vec<Uuid>, String> {
        self.ctx
            .trigger_event(event, data, correlation_id)
            .map_err(to_wire("trigger_event"))
    }

    async fn deliveries(
        self,
        _: context::Context,
        webhook_id: Uuid,
        limit: usize,
    ) -> Vec<DeliveryRecord> {
        self.ctx.deliveries(&webhook_id, limit)
    }

    async fn webhook_stats(self, _: context::Context) -> WebhookStats {
        self.ctx.webhook_stats()
    }

    async fn cache_stats(self, _: context::Context) -> ContextCacheStats {
        self.ctx.cache_stats()
    }

    async fn stats(self, _: context::Context) -> ServerStats {
        ServerStats {
            index: self.ctx.index_stats(),
            cache: self.ctx.cache_stats(),
            webhooks: self.ctx.webhook_stats(),
            connections: self.connections.snapshot(),
        }
    }
}
