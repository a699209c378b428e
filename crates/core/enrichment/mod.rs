//! Route enrichment pipeline and the provider interfaces it depends on.

pub mod enricher;
pub mod planner;
pub mod provider;

pub use enricher::{PoiCache, RouteEnricher, RouteEnrichment, poi_to_marker};
pub use planner::{PlannedRoute, RoutePlanner};
pub use provider::{
    Address, PoiProvider, PoiQuery, PoiResult, ReverseGeocoder, Route, RouteRequest,
    RoutingProvider, TravelProfile,
};
