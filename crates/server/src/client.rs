//! Thin async client over the generated tarpc stub.
//!
//! Flattens the transport and server error layers into [`ClientError`].

use crate::protocol::{BatchResponse, GeoServiceClient, ServerStats};
use geopin::enrichment::{Address, PlannedRoute, RouteEnrichment, RouteRequest};
use geopin::index::{IndexStats, MarkerHit};
use geopin::webhook::{DeliveryRecord, Webhook, WebhookEvent};
use geopin::BatchOptions;
use geopin_types::{Location, Marker};
use std::net::SocketAddr;
use tarpc::client;
use tarpc::context;
use tarpc::tokio_serde::formats::Json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),
    #[error("RPC error: {0}")]
    Rpc(#[from] tarpc::client::RpcError),
    #[error("Server error: {0}")]
    Server(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Clone)]
pub struct GeoClient {
    client: GeoServiceClient,
}

impl GeoClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let transport = tarpc::serde_transport::tcp::connect(addr, Json::default).await?;
        let client = GeoServiceClient::new(client::Config::default(), transport).spawn();
        Ok(Self { client })
    }

    /// The generated stub, for calls without a wrapper here.
    pub fn raw(&self) -> &GeoServiceClient {
        &self.client
    }

    pub async fn create_pin(&self, marker: Marker) -> Result<Marker> {
        self.client
            .create_pin(context::current(), marker)
            .await?
            .map_err(ClientError::Server)
    }

    pub async fn remove_pin(&self, id: &str) -> Result<bool> {
        Ok(self.client.remove_pin(context::current(), id.to_string()).await?)
    }

    pub async fn get_pin(&self, id: &str) -> Result<Option<Marker>> {
        Ok(self.client.get_pin(context::current(), id.to_string()).await?)
    }

    pub async fn query_radius(&self, center: Location, radius_m: f64) -> Result<Vec<MarkerHit>> {
        self.client
            .query_radius(context::current(), center, radius_m)
            .await?
            .map_err(ClientError::Server)
    }

    pub async fn query_bbox(&self, west: f64, south: f64, east: f64, north: f64) -> Result<Vec<Marker>> {
        self.client
            .query_bbox(context::current(), west, south, east, north)
            .await?
            .map_err(ClientError::Server)
    }

    pub async fn query_polygon(&self, exterior: Vec<Location>) -> Result<Vec<Marker>> {
        self.client
            .query_polygon(context::current(), exterior)
            .await?
            .map_err(ClientError::Server)
    }

    pub async fn nearest(&self, center: Location, k: usize) -> Result<Vec<MarkerHit>> {
        self.client
            .nearest(context::current(), center, k)
            .await?
            .map_err(ClientError::Server)
    }

    pub async fn index_stats(&self) -> Result<IndexStats> {
        Ok(self.client.index_stats(context::current()).await?)
    }

    pub async fn plan_route(&self, request: RouteRequest) -> Result<PlannedRoute> {
        self.client
            .plan_route(context::current(), request)
            .await?
            .map_err(ClientError::Server)
    }

    pub async fn enrich_route(
        &self,
        path: Vec<Location>,
        buffer_m: Option<f64>,
        categories: Vec<String>,
    ) -> Result<RouteEnrichment> {
        self.client
            .enrich_route(context::current(), path, buffer_m, categories)
            .await?
            .map_err(ClientError::Server)
    }

    pub async fn reverse_geocode(&self, location: Location) -> Result<Address> {
        self.client
            .reverse_geocode(context::current(), location)
            .await?
            .map_err(ClientError::Server)
    }

    pub async fn batch_reverse_geocode(
        &self,
        locations: Vec<Location>,
        options: BatchOptions,
    ) -> Result<BatchResponse<Address>> {
        self.client
            .batch_reverse_geocode(context::current(), locations, options)
            .await?
            .map_err(ClientError::Server)
    }

    pub async fn register_webhook(
        &self,
        url: &str,
        events: Vec<WebhookEvent>,
        secret: Option<String>,
    ) -> Result<Webhook> {
        self.client
            .register_webhook(context::current(), url.to_string(), events, secret)
            .await?
            .map_err(ClientError::Server)
    }

    pub async fn unregister_webhook(&self, id: Uuid) -> Result<bool> {
        Ok(self.client.unregister_webhook(context::current(), id).await?)
    }

    pub async fn trigger_event(
        &self,
        event: WebhookEvent,
        data: serde_json::Value,
        correlation_id: Option<String>,
    ) -> Result<Vec<Uuid>> {
        self.client
            .trigger_event(context::current(), event, data, correlation_id)
            .await?
            .map_err(ClientError::Server)
    }

    pub async fn deliveries(&self, webhook_id: Uuid, limit: usize) -> Result<Vec<DeliveryRecord>> {
        Ok(self
            .client
            .deliveries(context::current(), webhook_id, limit)
            .await?)
    }

    pub async fn stats(&self) -> Result<ServerStats> {
        Ok(self.client.stats(context::current()).await?)
    }
}
