//! In-memory geospatial context engine.
//!
//! ## Features
//! - **Spatial index**: radius-bounded markers in an R*-tree, with radius,
//!   bounding box, polygon and k-nearest queries
//! - **Route enrichment**: sample a path, look up POIs around each sample
//!   concurrently and index the deduplicated results
//! - **Batching**: bounded-concurrency execution with optional fail-fast
//! - **Caching**: TTL cache in front of every provider call
//! - **Webhooks**: signed, retried delivery of job lifecycle events
//!
//! Providers for routing, POIs and reverse geocoding are traits; plug in
//! implementations through [`GeoContext::builder`].
//!
//! ```rust
//! use geopin::prelude::*;
//!
//! let index = SpatialIndex::new(DistanceMetric::Geodesic);
//! let cafe = Marker::builder("cafe", Location::new(51.5074, -0.1278)?, 50.0)
//!     .name("Corner cafe")
//!     .build()?;
//! index.insert(cafe);
//!
//! let hits = index.query_by_radius(&Location::new(51.5075, -0.1278)?, 200.0)?;
//! assert_eq!(hits[0].marker.id, "cafe");
//! # Ok::<(), geopin::GeopinError>(())
//! ```

pub mod builder;
pub mod cache;
pub mod compute;
pub mod concurrency;
pub mod config;
pub mod context;
pub mod enrichment;
pub mod error;
pub mod index;
pub mod webhook;

pub use builder::GeoContextBuilder;
pub use context::{ContextCacheStats, GeoContext};
pub use error::{GeopinError, Result};

pub use geopin_types::{BoundingBox, Category, Location, Marker, MarkerPayload, Provenance};

pub use cache::{CacheStats, TtlCache, cache_key};
pub use compute::DistanceMetric;
pub use concurrency::{BatchOptions, BatchReport, ConcurrencyController, TaskError, TaskOutcome};
pub use config::{
    BatchConfig, CacheConfig, Config, EnrichmentConfig, IndexConfig, WebhookConfig,
};
pub use enrichment::{
    Address, PlannedRoute, PoiProvider, PoiQuery, PoiResult, ReverseGeocoder, Route,
    RouteEnricher, RouteEnrichment, RoutePlanner, RouteRequest, RoutingProvider, TravelProfile,
};
pub use index::{IndexStats, MarkerHit, SpatialIndex};
pub use webhook::{
    DeliveryRecord, DeliveryStatus, Webhook, WebhookDispatcher, WebhookEvent, WebhookPayload,
    WebhookStats, WebhookTransport,
};

pub use geo::Polygon;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {
    pub use crate::{GeoContext, GeoContextBuilder, GeopinError, Result};

    pub use crate::{BoundingBox, Category, Location, Marker, MarkerPayload, Provenance};

    pub use crate::{DistanceMetric, MarkerHit, Polygon, SpatialIndex};

    pub use crate::{BatchOptions, BatchReport, Config};

    pub use crate::{Address, PoiProvider, PoiResult, ReverseGeocoder, Route, RouteRequest, RoutingProvider};

    pub use crate::{WebhookEvent, WebhookTransport};

    pub use std::time::Duration;
}
