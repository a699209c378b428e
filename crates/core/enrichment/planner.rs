//! Route planning with POI enrichment along the planned polyline.

use super::enricher::{RouteEnricher, RouteEnrichment};
use super::provider::{Route, RouteRequest, RoutingProvider};
use crate::compute::validation::validate_path;
use crate::compute::{DistanceMetric, path_length};
use crate::error::{GeopinError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedRoute {
    pub route: Route,
    /// The routing provider failed and `route` is a straight line through
    /// the requested points
    pub fallback: bool,
    pub enrichment: RouteEnrichment,
}

pub struct RoutePlanner {
    routing: Arc<dyn RoutingProvider>,
    enricher: Arc<RouteEnricher>,
}

impl RoutePlanner {
    pub fn new(routing: Arc<dyn RoutingProvider>, enricher: Arc<RouteEnricher>) -> Self {
        Self { routing, enricher }
    }

    pub fn enricher(&self) -> &Arc<RouteEnricher> {
        &self.enricher
    }

    /// Plan a route and enrich it.
    ///
    /// A routing failure never fails the plan: the route degrades to a
    /// straight line through the requested points. POI lookups degrade the
    /// same way, so the route geometry is always returned.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for out-of-range points or a bad buffer.
    pub async fn plan(&self, request: &RouteRequest) -> Result<PlannedRoute> {
        let points = request.points();
        validate_path(&points)?;

        let buffer_m = request
            .buffer_m
            .unwrap_or(self.enricher.config().default_buffer_m);
        self.enricher.check_buffer(buffer_m)?;

        let (route, fallback) = match self.routing.route(request).await {
            Ok(route) if !route.polyline.is_empty() => (route, false),
            Ok(_) => {
                log::warn!(
                    "Routing provider '{}' returned an empty polyline, using straight line",
                    self.routing.name()
                );
                (straight_line(request), true)
            }
            Err(e) => {
                log::warn!("Routing failed, using straight line: {}", e);
                (straight_line(request), true)
            }
        };

        if let Err(e) = validate_path(&route.polyline) {
            return Err(GeopinError::provider(
                self.routing.name(),
                format!("route geometry invalid: {}", e),
            ));
        }

        let enrichment = self
            .enricher
            .enrich(&route.polyline, buffer_m, &request.categories)
            .await?;

        Ok(PlannedRoute {
            route,
            fallback,
            enrichment,
        })
    }
}

/// Straight-line route through the request's points, with the duration
/// estimated from the profile's average speed.
pub fn straight_line(request: &RouteRequest) -> Route {
    let polyline = request.points();
    let distance_m = path_length(&polyline, DistanceMetric::Haversine);
    Route {
        duration_s: distance_m / request.profile.average_speed_mps(),
        distance_m,
        polyline,
    }
}
