use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ipcountry::api::create_router;
use ipcountry::config::Config;
use ipcountry::geo::{GeoLookup, IpApiClient};
use ipcountry::metrics::PrometheusMetrics;
use ipcountry::resolver::CountryResolver;
use ipcountry::storage;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env().context("cannot load configuration")?;
    info!("Loaded configuration");

    // Initialize storage
    let pool = &config.database.pool;
    info!(
        max_open = pool.max_open_conns,
        max_idle = pool.max_idle_conns,
        max_lifetime_secs = pool.max_lifetime.as_secs(),
        max_idle_time_secs = pool.max_idle_time.as_secs(),
        "Connecting to database"
    );
    let store = storage::connect(&config.database)
        .await
        .context("cannot create the database connection")?;
    store.init().await.context("cannot initialize the cache table")?;
    info!("Database initialized successfully");

    // Geolocation client and metrics
    let geo = Arc::new(IpApiClient::new(&config.geo_api)?);
    info!(
        provider = geo.name(),
        base_url = %config.geo_api.base_url,
        timeout_secs = config.geo_api.timeout.as_secs(),
        "Geolocation client ready"
    );
    let metrics = Arc::new(PrometheusMetrics::new().context("cannot register metrics")?);

    let resolver = CountryResolver::new(store, geo, metrics);
    let app = create_router(resolver, &config.server.client_ip_header);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {}", addr))?;
    info!("🚀 Server listening on http://{}", addr);
    info!(
        "   - Client address read from the '{}' header",
        config.server.client_ip_header
    );
    info!("   - Metrics available at http://{}/metrics", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
