//! Protocol definitions for geopin RPC
//!
//! This module contains the service trait and the wire types used for RPC
//! communication. Engine errors cross the wire as strings.

use geopin::concurrency::{BatchReport, TaskError};
use geopin::enrichment::{Address, PlannedRoute, PoiResult, RouteEnrichment, RouteRequest};
use geopin::index::{IndexStats, MarkerHit};
use geopin::webhook::{DeliveryRecord, Webhook, WebhookEvent, WebhookStats};
use geopin::{BatchOptions, ContextCacheStats, PoiQuery};
use geopin_types::{Location, Marker};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

/// One request within a batch response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct BatchItem<T> {
    pub index: usize,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse<T> {
    pub total_requests: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<BatchItem<T>>,
    pub duration_ms: u64,
}

impl<T, E: Display> From<BatchReport<T, E>> for BatchResponse<T> {
    fn from(report: BatchReport<T, E>) -> Self {
        let results = report
            .results
            .into_iter()
            .map(|outcome| match outcome.result {
                Ok(data) => BatchItem {
                    index: outcome.index,
                    success: true,
                    data: Some(data),
                    error: None,
                },
                Err(e) => BatchItem {
                    index: outcome.index,
                    success: false,
                    data: None,
                    error: Some(match e {
                        TaskError::Failed(e) => e.to_string(),
                        TaskError::Stopped => TaskError::<E>::Stopped.to_string(),
                    }),
                },
            })
            .collect::<Vec<_>>();

        Self {
            total_requests: results.len(),
            successful: report.successful,
            failed: report.failed,
            results,
            duration_ms: report.duration.as_millis() as u64,
        }
    }
}

/// Client connections seen by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStats {
    pub open: usize,
    pub accepted: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerStats {
    pub index: IndexStats,
    pub cache: ContextCacheStats,
    pub webhooks: WebhookStats,
    #[serde(default)]
    pub connections: ConnectionStats,
}

#[tarpc::service]
pub trait GeoService {
    async fn create_pin(marker: Marker) -> Result<Marker, String>;

    async fn remove_pin(id: String) -> bool;

    async fn get_pin(id: String) -> Option<Marker>;

    async fn query_radius(center: Location, radius_m: f64) -> Result<Vec<MarkerHit>, String>;

    async fn query_bbox(west: f64, south: f64, east: f64, north: f64)
    -> Result<Vec<Marker>, String>;

    /// Exterior ring only; the ring is closed automatically.
    async fn query_polygon(exterior: Vec<Location>) -> Result<Vec<Marker>, String>;

    async fn nearest(center: Location, k: usize) -> Result<Vec<MarkerHit>, String>;

    async fn index_stats() -> IndexStats;

    async fn plan_route(request: RouteRequest) -> Result<PlannedRoute, String>;

    async fn enrich_route(
        path: Vec<Location>,
        buffer_m: Option<f64>,
        categories: Vec<String>,
    ) -> Result<RouteEnrichment, String>;

    async fn reverse_geocode(location: Location) -> Result<Address, String>;

    async fn find_pois(
        location: Location,
        radius_m: f64,
        categories: Vec<String>,
    ) -> Result<Vec<PoiResult>, String>;

    async fn batch_reverse_geocode(
        locations: Vec<Location>,
        options: BatchOptions,
    ) -> Result<BatchResponse<Address>, String>;

    async fn batch_find_pois(
        queries: Vec<PoiQuery>,
        options: BatchOptions,
    ) -> Result<BatchResponse<Vec<PoiResult>>, String>;

    async fn register_webhook(
        url: String,
        events: Vec<WebhookEvent>,
        secret: Option<String>,
    ) -> Result<Webhook, String>;

    async fn unregister_webhook(id: Uuid) -> bool;

    async fn set_webhook_active(id: Uuid, active: bool) -> bool;

    async fn list_webhooks() -> Vec<Webhook>;

    async fn trigger_event(
        event: WebhookEvent,
        data: serde_json::Value,
        correlation_id: Option<String>,
    ) -> Result<Vec<Uuid>, String>;

    async fn deliveries(webhook_id: Uuid, limit: usize) -> Vec<DeliveryRecord>;

    async fn webhook_stats() -> WebhookStats;

    async fn cache_stats() -> ContextCacheStats;

    async fn stats() -> ServerStats;
}

#[cfg(test)]
mod tests {
    use super::*;
    use geopin::concurrency::TaskOutcome;
    use std::time::Duration;

    #[test]
    fn test_batch_response_shape() {
        let report: BatchReport<u32, String> = BatchReport {
            results: vec![
                TaskOutcome {
                    index: 0,
                    result: Ok(7),
                },
                TaskOutcome {
                    index: 1,
                    result: Err(TaskError::Failed("upstream 503".to_string())),
                },
                TaskOutcome {
                    index: 2,
                    result: Err(TaskError::Stopped),
                },
            ],
            successful: 1,
            failed: 2,
            duration: Duration::from_millis(42),
        };

        let response = BatchResponse::from(report);
        assert_eq!(response.total_requests, 3);
        assert_eq!(response.duration_ms, 42);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["results"][0]["data"], 7);
        assert!(json["results"][0].get("error").is_none());
        assert_eq!(json["results"][1]["error"], "upstream 503");
        assert_eq!(json["results"][2]["error"], "stopped due to previous error");
        assert_eq!(json["results"][2]["success"], false);
    }
}
