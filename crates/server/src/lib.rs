//! geopin server
//!
//! Exposes a [`GeoContext`](geopin::GeoContext) over tarpc RPC (TCP, JSON
//! framing) and provides reqwest-backed adapters for the engine's routing,
//! POI and reverse-geocoding traits.
//!
//! # Example
//!
//! ```ignore
//! use geopin_server::run_server;
//!
//! run_server(listener, ctx, shutdown).await?;
//! ```

pub mod client;
pub mod handler;
pub mod protocol;
pub mod providers;
pub mod transport;

pub use client::{ClientError, GeoClient};
pub use protocol::{
    BatchItem, BatchResponse, ConnectionStats, GeoService, GeoServiceClient, ServerStats,
};
pub use providers::{HttpSettings, NominatimGeocoder, OsrmRouter, OverpassPoiProvider};

pub use transport::rpc::run_server;
