//! cloud-device-bridge
//!
//! Exposes MyJDownloader instances and Vorwerk Kobold robots as switches
//! and sensors over a small HTTP API, with account registration flows and
//! periodic polling of the vendor clouds.

mod api;
mod config;
mod entity;
mod error;
mod flow;
mod hub;
mod jdownloader;
mod models;
mod poll;
mod session;
mod store;
mod vorwerk;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::AppState;
use crate::flow::FlowResult;
use crate::hub::{Connector, Hub};
use crate::models::DeviceRecord;
use crate::poll::Poller;
use crate::store::ConfigStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cloud_device_bridge=info,tower_http=debug".into()),
        )
        .init();

    tracing::info!("Starting cloud-device-bridge...");

    // Load configuration
    let config = config::Config::load()?;
    tracing::info!("Configuration loaded");

    let store = Arc::new(ConfigStore::open(&config.store.path).await?);
    let hub = Arc::new(Hub::new(Connector::new(&config)?));

    // Load stored entries; a broken entry must not keep the others down
    for entry in store.entries().await {
        if let Err(e) = hub.load_entry(&entry).await {
            tracing::warn!("Failed to load entry '{}' (non-fatal): {}", entry.title, e);
        }
    }

    let state = AppState::new(store.clone(), hub.clone());

    // Robots listed in the configuration file
    if !config.vorwerk.robots.is_empty() {
        let devices: Vec<DeviceRecord> = config.vorwerk.robots.iter().map(DeviceRecord::from).collect();
        match state.flows.import_robots(devices).await {
            Ok(FlowResult::CreateEntry { entry }) => {
                tracing::info!("Imported {} robots from configuration", entry.account.devices.len())
            }
            Ok(_) => tracing::debug!("Configured robots already imported"),
            Err(e) => tracing::warn!("Robot import failed (non-fatal): {}", e),
        }
    }

    start_background_tasks(
        hub,
        store,
        Duration::from_secs(config.polling.scan_interval_secs.max(1)),
    );

    // Build application router
    let cors = CorsLayer::permissive();

    let app = api::routes().with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    );

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Start background tasks (entity poller)
fn start_background_tasks(hub: Arc<Hub>, store: Arc<ConfigStore>, interval: Duration) {
    let poller = Arc::new(Poller::new(hub, store, interval));
    tokio::spawn(async move {
        poller.start().await;
    });
}
