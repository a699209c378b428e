//! OSRM `route/v1` adapter.

use super::{HttpSettings, base_url, fetch_json};
use async_trait::async_trait;
use geopin::enrichment::{Route, RouteRequest, RoutingProvider, TravelProfile};
use geopin::{GeopinError, Result};
use geopin_types::Location;
use reqwest::{Client, Url};
use serde::Deserialize;

const PROVIDER: &str = "osrm";

pub struct OsrmRouter {
    client: Client,
    base: Url,
}

impl OsrmRouter {
    pub fn new(base: &str, settings: &HttpSettings) -> Result<Self> {
        Ok(Self {
            client: settings.client()?,
            base: base_url(PROVIDER, base)?,
        })
    }

    fn route_url(&self, request: &RouteRequest) -> String {
        format!(
            "{}/route/v1/{}/{}",
            self.base.as_str().trim_end_matches('/'),
            profile_segment(request.profile),
            build_coordinate_string(&request.points())
        )
    }
}

fn profile_segment(profile: TravelProfile) -> &'static str {
    match profile {
        TravelProfile::Driving => "driving",
        TravelProfile::Cycling => "cycling",
        TravelProfile::Walking => "foot",
    }
}

/// `lon,lat;lon,lat;...`
pub fn build_coordinate_string(points: &[Location]) -> String {
    points
        .iter()
        .map(|p| format!("{:.6},{:.6}", p.lon, p.lat))
        .collect::<Vec<_>>()
        .join(";")
}

#[derive(Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    geometry: OsrmGeometry,
}

#[derive(Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

fn into_route(response: OsrmResponse) -> Result<Route> {
    if response.code != "Ok" {
        return Err(GeopinError::provider(
            PROVIDER,
            format!(
                "{}: {}",
                response.code,
                response.message.unwrap_or_default()
            ),
        ));
    }

    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| GeopinError::provider(PROVIDER, "no route found"))?;

    let polyline = route
        .geometry
        .coordinates
        .iter()
        .map(|[lon, lat]| Location::new(*lat, *lon))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| GeopinError::provider(PROVIDER, format!("bad geometry: {}", e)))?;

    Ok(Route {
        polyline,
        distance_m: route.distance,
        duration_s: route.duration,
    })
}

#[async_trait]
impl RoutingProvider for OsrmRouter {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn route(&self, request: &RouteRequest) -> Result<Route> {
        let url = self.route_url(request);
        let response: OsrmResponse = fetch_json(
            PROVIDER,
            self.client
                .get(&url)
                .query(&[("overview", "full"), ("geometries", "geojson")]),
        )
        .await?;
        into_route(response)
    }
}
