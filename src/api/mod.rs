//! API module - HTTP handlers and routes

pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::flow::FlowManager;
use crate::hub::Hub;
use crate::store::ConfigStore;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConfigStore>,
    pub hub: Arc<Hub>,
    pub flows: Arc<FlowManager>,
}

impl AppState {
    pub fn new(store: Arc<ConfigStore>, hub: Arc<Hub>) -> Self {
        let flows = Arc::new(FlowManager::new(store.clone(), hub.clone()));
        Self { store, hub, flows }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .route("/api/health", get(handlers::health_check))
        // Registration flows
        .route("/api/flows", post(handlers::start_flow))
        .route("/api/flows/:flow_id", post(handlers::progress_flow))
        // Config entries
        .route("/api/entries", get(handlers::list_entries))
        .route("/api/entries/:entry_id", delete(handlers::delete_entry))
        // Entities
        .route("/api/entities", get(handlers::list_entities))
        .route("/api/entities/:unique_id/turn_on", post(handlers::turn_on))
        .route("/api/entities/:unique_id/turn_off", post(handlers::turn_off))
        .route(
            "/api/entities/:unique_id/services/:service",
            post(handlers::call_service),
        )
}
