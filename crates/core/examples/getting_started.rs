use async_trait::async_trait;
use geopin::prelude::*;
use std::sync::Arc;

/// Offline stand-ins for the HTTP providers used by geopin-server.
struct StraightRouter;

#[async_trait]
impl RoutingProvider for StraightRouter {
    fn name(&self) -> &str {
        "straight"
    }

    async fn route(&self, request: &RouteRequest) -> Result<Route> {
        Ok(geopin::enrichment::planner::straight_line(request))
    }
}

struct LandmarkPois;

#[async_trait]
impl PoiProvider for LandmarkPois {
    fn name(&self) -> &str {
        "landmarks"
    }

    async fn find_pois(&self, _: &Location, _: f64, _: &[String]) -> Result<Vec<PoiResult>> {
        Ok(vec![
            PoiResult::new("Trafalgar Square", Location::new(51.5080, -0.1281)?)
                .with_id("node/1")
                .with_tag("tourism", "attraction"),
            PoiResult::new("National Gallery", Location::new(51.5089, -0.1283)?)
                .with_id("node/2")
                .with_tag("tourism", "gallery"),
        ])
    }
}

struct PlaceholderGeocoder;

#[async_trait]
impl ReverseGeocoder for PlaceholderGeocoder {
    fn name(&self) -> &str {
        "placeholder"
    }

    async fn reverse(&self, location: &Location) -> Result<Address> {
        Ok(Address {
            display_name: format!("Near {}", location),
            ..Address::default()
        })
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug to see detailed logs)
    env_logger::init();

    println!("=== geopin - Getting Started ===\n");

    let ctx = GeoContext::builder()
        .routing(Arc::new(StraightRouter))
        .poi_provider(Arc::new(LandmarkPois))
        .geocoder(Arc::new(PlaceholderGeocoder))
        .build()?;

    // === PINS ===
    println!("1. Pins");
    println!("-------");

    let big_ben = Marker::builder("big-ben", Location::new(51.5007, -0.1246)?, 75.0)
        .category(Category::Landmark)
        .name("Big Ben")
        .build()?;
    ctx.create_pin(big_ben)?;

    let hits = ctx.query_radius(&Location::new(51.5010, -0.1250)?, 500.0)?;
    for hit in &hits {
        println!("   {} at {:.1} m", hit.marker.payload.name, hit.distance_m);
    }
    println!();

    // === ROUTES ===
    println!("2. Route planning with enrichment");
    println!("---------------------------------");

    let request = RouteRequest::new(Location::new(51.5007, -0.1246)?, Location::new(51.5080, -0.1281)?)
        .with_buffer(300.0);
    let planned = ctx.plan_route(&request).await?;
    println!(
        "   {:.0} m, {} samples, {} markers found",
        planned.route.distance_m,
        planned.enrichment.sample_count,
        planned.enrichment.markers.len()
    );
    for marker in &planned.enrichment.markers {
        println!("     - {} ({})", marker.payload.name, marker.category.as_str());
    }
    println!();

    // === BATCHES ===
    println!("3. Batch reverse geocoding");
    println!("--------------------------");

    let report = ctx
        .batch_reverse_geocode(
            vec![Location::new(48.8566, 2.3522)?, Location::new(40.7128, -74.0060)?],
            BatchOptions::default(),
        )
        .await?;
    println!("   {} ok, {} failed in {:?}", report.successful, report.failed, report.duration);
    println!();

    // === STATS ===
    let stats = ctx.index_stats();
    let cache = ctx.cache_stats();
    println!("Index: {} pins", stats.total_pins);
    println!("POI cache hit rate: {:.0}%", cache.pois.hit_rate() * 100.0);

    ctx.shutdown().await;
    Ok(())
}
