//! Entity handlers

use axum::{
    extract::{Path, State},
    Json,
};

use crate::api::AppState;
use crate::error::AppError;
use crate::models::EntitySnapshot;

use super::SuccessResponse;

/// GET /api/entities - Current state of every entity
pub async fn list_entities(State(state): State<AppState>) -> Json<Vec<EntitySnapshot>> {
    Json(state.hub.snapshots().await)
}

/// POST /api/entities/:unique_id/turn_on
pub async fn turn_on(
    State(state): State<AppState>,
    Path(unique_id): Path<String>,
) -> Result<Json<EntitySnapshot>, AppError> {
    Ok(Json(state.hub.turn(&unique_id, true).await?))
}

/// POST /api/entities/:unique_id/turn_off
pub async fn turn_off(
    State(state): State<AppState>,
    Path(unique_id): Path<String>,
) -> Result<Json<EntitySnapshot>, AppError> {
    Ok(Json(state.hub.turn(&unique_id, false).await?))
}

/// POST /api/entities/:unique_id/services/:service - Run a device service
pub async fn call_service(
    State(state): State<AppState>,
    Path((unique_id, service)): Path<(String, String)>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.hub.call_service(&unique_id, &service).await?;
    Ok(Json(SuccessResponse::new(format!("Called {}", service))))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::api::handlers::testing;
    use crate::entity::testing::FakeDevice;
    use crate::entity::DeviceApi;
    use crate::error::{HubError, RemoteError};
    use crate::hub::Connection;
    use crate::jdownloader::{OP_PAUSE, OP_START};
    use crate::models::{Account, ConfigEntry, DeviceRecord, Integration};
    use serde_json::json;

    async fn state_with(device: FakeDevice) -> AppState {
        let state = testing::state();
        let entry = ConfigEntry::new(
            Integration::JDownloader,
            "MyJDownloader",
            "me@example.com",
            Account {
                identifier: None,
                token: None,
                devices: vec![],
            },
        );
        let api: Arc<dyn DeviceApi> = Arc::new(device);
        state
            .hub
            .attach(
                &entry,
                Connection {
                    session: None,
                    directory: None,
                    devices: vec![(DeviceRecord::new("Office", "abc"), api)],
                },
            )
            .await;
        state
    }

    const PAUSE_ID: &str = "myjdownloader_JDownloader Office Pause_switch_pause";

    #[tokio::test]
    async fn test_turn_on_returns_snapshot() {
        let state = state_with(FakeDevice::default().reply(OP_PAUSE, Ok(json!(true)))).await;

        let Json(snapshot) = turn_on(State(state.clone()), Path(PAUSE_ID.to_string()))
            .await
            .unwrap();
        assert_eq!(snapshot.state, json!("on"));

        let Json(all) = list_entities(State(state)).await;
        assert_eq!(all.len(), 7);
    }

    #[tokio::test]
    async fn test_failed_command_surfaces_remote_error() {
        let state = state_with(
            FakeDevice::default().reply(OP_PAUSE, Err(RemoteError::Transport("offline".into()))),
        )
        .await;

        let err = turn_off(State(state.clone()), Path(PAUSE_ID.to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Hub(HubError::Remote(_))));

        let Json(all) = list_entities(State(state)).await;
        let pause = all.iter().find(|s| s.unique_id == PAUSE_ID).unwrap();
        assert!(!pause.available);
        assert_eq!(pause.state, json!("unknown"));
    }

    #[tokio::test]
    async fn test_call_service() {
        let state = state_with(FakeDevice::default().reply(OP_START, Ok(json!(true)))).await;
        let Json(resp) = call_service(
            State(state),
            Path((PAUSE_ID.to_string(), "start_downloads".to_string())),
        )
        .await
        .unwrap();
        assert_eq!(resp.message, "Called start_downloads");
    }
}
