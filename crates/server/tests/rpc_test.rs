use async_trait::async_trait;
use geopin::enrichment::{
    Address, PoiProvider, PoiResult, ReverseGeocoder, Route, RouteRequest, RoutingProvider,
};
use geopin::webhook::{DeliveryError, WebhookEvent, WebhookRequest, WebhookTransport};
use geopin::{BatchOptions, GeoContext, GeopinError, Result};
use geopin_server::{GeoClient, run_server};
use geopin_types::{Category, Location, Marker};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn loc(lat: f64, lon: f64) -> Location {
    Location::new(lat, lon).unwrap()
}

struct DownRouter;

#[async_trait]
impl RoutingProvider for DownRouter {
    fn name(&self) -> &str {
        "down"
    }

    async fn route(&self, _request: &RouteRequest) -> Result<Route> {
        Err(GeopinError::provider("down", "service unavailable"))
    }
}

struct OnePoi;

#[async_trait]
impl PoiProvider for OnePoi {
    fn name(&self) -> &str {
        "one"
    }

    async fn find_pois(&self, _: &Location, _: f64, _: &[String]) -> Result<Vec<PoiResult>> {
        Ok(vec![
            PoiResult::new("Brandenburger Tor", loc(52.5163, 13.3777))
                .with_id("node/7")
                .with_tag("historic", "monument"),
        ])
    }
}

struct PolarGeocoder;

#[async_trait]
impl ReverseGeocoder for PolarGeocoder {
    fn name(&self) -> &str {
        "polar"
    }

    async fn reverse(&self, location: &Location) -> Result<Address> {
        if location.lat.abs() > 80.0 {
            return Err(GeopinError::provider("polar", "no address here"));
        }
        Ok(Address {
            display_name: "Somewhere".to_string(),
            ..Address::default()
        })
    }
}

#[derive(Default)]
struct CountingTransport {
    sent: AtomicUsize,
}

#[async_trait]
impl WebhookTransport for CountingTransport {
    async fn send(&self, _request: &WebhookRequest) -> std::result::Result<(), DeliveryError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

async fn start() -> anyhow::Result<(GeoClient, Arc<GeoContext>, Arc<CountingTransport>)> {
    tracing_subscriber::fmt::try_init().ok();

    let transport = Arc::new(CountingTransport::default());
    let ctx = Arc::new(
        GeoContext::builder()
            .routing(Arc::new(DownRouter))
            .poi_provider(Arc::new(OnePoi))
            .geocoder(Arc::new(PolarGeocoder))
            .webhook_transport(transport.clone())
            .build()?,
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let bound_addr: SocketAddr = listener.local_addr()?;

    let server_ctx = ctx.clone();
    tokio::spawn(async move {
        let _ = run_server(listener, server_ctx, futures::future::pending()).await;
    });

    // Wait for server to start
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

    let client = GeoClient::connect(bound_addr).await?;
    Ok((client, ctx, transport))
}

#[tokio::test]
async fn test_pin_rpc_lifecycle() -> anyhow::Result<()> {
    let (client, _ctx, _) = start().await?;

    let marker = Marker::builder("gate", loc(52.5163, 13.3777), 80.0)
        .category(Category::Landmark)
        .name("Brandenburg Gate")
        .build()?;
    client.create_pin(marker).await?;

    let hits = client.query_radius(loc(52.5164, 13.3778), 300.0).await?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].marker.id, "gate");

    let in_box = client.query_bbox(13.0, 52.0, 14.0, 53.0).await?;
    assert_eq!(in_box.len(), 1);

    let ring = vec![loc(52.5, 13.3), loc(52.5, 13.5), loc(52.6, 13.5), loc(52.6, 13.3)];
    assert_eq!(client.query_polygon(ring).await?.len(), 1);

    assert_eq!(client.nearest(loc(0.0, 0.0), 3).await?.len(), 1);
    assert_eq!(client.index_stats().await?.total_pins, 1);

    assert!(client.remove_pin("gate").await?);
    assert!(client.get_pin("gate").await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_validation_errors_cross_the_wire() -> anyhow::Result<()> {
    let (client, _ctx, _) = start().await?;

    let err = client.query_radius(loc(10.0, 10.0), -5.0).await.unwrap_err();
    assert!(err.to_string().contains("Radius"));

    let err = client.query_bbox(0.0, 10.0, 1.0, 5.0).await.unwrap_err();
    assert!(matches!(err, geopin_server::ClientError::Server(_)));

    Ok(())
}

#[tokio::test]
async fn test_plan_route_fallback_over_rpc() -> anyhow::Result<()> {
    let (client, _ctx, _) = start().await?;

    let request = RouteRequest::new(loc(52.52, 13.405), loc(52.5163, 13.3777)).with_buffer(250.0);
    let planned = client.plan_route(request).await?;

    assert!(planned.fallback);
    assert_eq!(planned.route.polyline.len(), 2);
    assert_eq!(planned.enrichment.markers.len(), 1);
    assert_eq!(planned.enrichment.markers[0].category, Category::Historical);
    assert!(client.get_pin("node/7").await?.is_some());

    Ok(())
}

#[tokio::test]
async fn test_batch_response_over_rpc() -> anyhow::Result<()> {
    let (client, _ctx, _) = start().await?;

    let response = client
        .batch_reverse_geocode(vec![loc(48.0, 2.0), loc(85.0, 0.0)], BatchOptions::default())
        .await?;

    assert_eq!(response.total_requests, 2);
    assert_eq!(response.successful, 1);
    assert_eq!(response.failed, 1);
    assert!(response.results[0].success);
    assert_eq!(response.results[0].data.as_ref().unwrap().display_name, "Somewhere");
    assert!(response.results[1].error.as_ref().unwrap().contains("no address here"));

    let empty = client.batch_reverse_geocode(Vec::new(), BatchOptions::default()).await;
    assert!(empty.is_err());

    Ok(())
}

#[tokio::test]
async fn test_webhook_rpc() -> anyhow::Result<()> {
    let (client, ctx, transport) = start().await?;

    let hook = client
        .register_webhook(
            "https://hooks.example.com/geo",
            vec![WebhookEvent::BatchCompleted],
            Some("s3cret".to_string()),
        )
        .await?;
    assert!(hook.secret.is_none());

    assert!(client.register_webhook("ftp://nope", vec![WebhookEvent::BatchCompleted], None).await.is_err());

    let ids = client
        .trigger_event(WebhookEvent::BatchCompleted, serde_json::json!({"manual": true}), None)
        .await?;
    assert_eq!(ids.len(), 1);

    ctx.shutdown().await;
    assert_eq!(transport.sent.load(Ordering::SeqCst), 1);

    let records = client.deliveries(hook.id, 10).await?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, ids[0]);

    let stats = client.stats().await?;
    assert_eq!(stats.webhooks.successful_deliveries, 1);
    assert_eq!(stats.webhooks.total_webhooks, 1);
    assert_eq!(stats.connections.open, 1);
    assert_eq!(stats.connections.accepted, 1);

    assert!(client.unregister_webhook(hook.id).await?);
    assert!(client.deliveries(hook.id, 10).await?.is_empty());
    Ok(())
}
