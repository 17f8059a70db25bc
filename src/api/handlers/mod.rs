//! HTTP handlers module

mod entities;
mod entries;
mod flows;

pub use self::entities::*;
pub use self::entries::*;
pub use self::flows::*;

use axum::{response::IntoResponse, Json};
use serde::Serialize;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "cloud-device-bridge".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Generic success response
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl SuccessResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            id: None,
        }
    }

    pub fn with_id(message: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            id: Some(id.into()),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use crate::api::AppState;
    use crate::config::Config;
    use crate::hub::{Connector, Hub};
    use crate::store::ConfigStore;

    pub fn state() -> AppState {
        let store = Arc::new(ConfigStore::in_memory());
        let hub = Arc::new(Hub::new(Connector::new(&Config::default()).unwrap()));
        AppState::new(store, hub)
    }
}
