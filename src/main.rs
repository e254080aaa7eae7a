use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

use warehouse_datasource::api;
use warehouse_datasource::config::Config;
use warehouse_datasource::services::{RestSessionFactory, WarehouseDatasource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!("Starting server on {}", config.server_address());

    let instance = config.datasource.instance_settings();
    let datasource = Arc::new(WarehouseDatasource::new(Arc::new(RestSessionFactory)));
    datasource.init_instance(&instance).map_err(|e| {
        error!("Failed to initialize datasource {}: {}", instance.id, e);
        e
    })?;

    // Create router with state
    let app: Router = api::routes::create_router_with_state(datasource, vec![instance]);

    // Start server
    let addr: SocketAddr = config.server_address().parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
