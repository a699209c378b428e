use anyhow::Context as _;
use clap::Parser;
use geopin::{Config, GeoContext};
use geopin_server::{HttpSettings, NominatimGeocoder, OsrmRouter, OverpassPoiProvider, run_server};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "GEOPIN_PORT", default_value_t = 3000)]
    port: u16,

    #[arg(long, env = "GEOPIN_HOST", default_value = "127.0.0.1")]
    host: String,

    /// TOML engine configuration
    #[arg(short, long, env = "GEOPIN_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "GEOPIN_OSRM_URL", default_value = "https://router.project-osrm.org")]
    osrm_url: String,

    #[arg(
        long,
        env = "GEOPIN_OVERPASS_URL",
        default_value = "https://overpass-api.de/api/interpreter"
    )]
    overpass_url: String,

    #[arg(
        long,
        env = "GEOPIN_NOMINATIM_URL",
        default_value = "https://nominatim.openstreetmap.org"
    )]
    nominatim_url: String,

    /// User-Agent sent to providers (Nominatim and Overpass require one)
    #[arg(long, env = "GEOPIN_USER_AGENT")]
    user_agent: Option<String>,

    #[arg(long, env = "GEOPIN_PROVIDER_TIMEOUT_SECS", default_value_t = 10)]
    provider_timeout_secs: u64,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config =
        Config::from_toml(&raw).with_context(|| format!("parsing config {}", path.display()))?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "geopin_server=info,geopin=info,info".into()),
        )
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    let mut settings = HttpSettings {
        timeout: Duration::from_secs(args.provider_timeout_secs),
        ..HttpSettings::default()
    };
    if let Some(user_agent) = args.user_agent {
        settings.user_agent = user_agent;
    }

    let ctx = GeoContext::builder()
        .config(config)
        .routing(Arc::new(OsrmRouter::new(&args.osrm_url, &settings)?))
        .poi_provider(Arc::new(OverpassPoiProvider::new(&args.overpass_url, &settings)?))
        .geocoder(Arc::new(NominatimGeocoder::new(&args.nominatim_url, &settings)?))
        .build()?;
    let ctx = Arc::new(ctx);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl_c signal: {}", e);
            futures::future::pending::<()>().await;
        }
    };

    run_server(listener, ctx.clone(), Box::pin(shutdown)).await?;

    info!("Draining webhook deliveries...");
    ctx.shutdown().await;

    Ok(())
}
