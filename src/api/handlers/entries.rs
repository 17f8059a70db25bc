//! Config entry handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::api::AppState;
use crate::error::AppError;
use crate::models::{ConfigEntry, Integration};

use super::SuccessResponse;

/// Entry without tokens and robot secrets
#[derive(Debug, Serialize)]
pub struct EntrySummary {
    pub entry_id: String,
    pub integration: Integration,
    pub title: String,
    pub unique_id: String,
    pub devices: Vec<DeviceSummary>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct DeviceSummary {
    pub name: String,
    pub serial: String,
    pub persistent_maps: Vec<String>,
}

impl From<ConfigEntry> for EntrySummary {
    fn from(entry: ConfigEntry) -> Self {
        let devices = entry
            .account
            .devices
            .into_iter()
            .map(|d| DeviceSummary {
                persistent_maps: d
                    .persistent_maps
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|m| m.name().map(str::to_string))
                    .collect(),
                name: d.name,
                serial: d.serial,
            })
            .collect();

        Self {
            entry_id: entry.entry_id,
            integration: entry.integration,
            title: entry.title,
            unique_id: entry.unique_id,
            devices,
            created_at: entry.created_at,
        }
    }
}

/// GET /api/entries - List config entries
pub async fn list_entries(State(state): State<AppState>) -> Json<Vec<EntrySummary>> {
    let entries = state.store.entries().await;
    Json(entries.into_iter().map(EntrySummary::from).collect())
}

/// DELETE /api/entries/:entry_id - Remove an entry and its entities
pub async fn delete_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    let removed = state.store.remove(&entry_id).await?;
    state.hub.unload_entry(&entry_id).await;

    Ok(Json(SuccessResponse::with_id(
        format!("Removed {}", removed.title),
        entry_id,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::testing;
    use crate::error::StoreError;
    use crate::models::{Account, DeviceRecord, Token};

    #[tokio::test]
    async fn test_list_hides_secrets_and_delete_removes() {
        let state = testing::state();
        let mut robot = DeviceRecord::new("Kobold", "S1");
        robot.secret = Some("secret".into());
        let entry = state
            .store
            .insert(ConfigEntry::new(
                Integration::Vorwerk,
                "a@b.com",
                "a@b.com",
                Account {
                    identifier: Some("a@b.com".into()),
                    token: Some(Token::new("t")),
                    devices: vec![robot],
                },
            ))
            .await
            .unwrap();

        let Json(list) = list_entries(State(state.clone())).await;
        let body = serde_json::to_string(&list).unwrap();
        assert!(body.contains("S1"));
        assert!(!body.contains("secret"));

        let Json(resp) = delete_entry(State(state.clone()), Path(entry.entry_id.clone()))
            .await
            .unwrap();
        assert_eq!(resp.id, Some(entry.entry_id.clone()));

        let err = delete_entry(State(state), Path(entry.entry_id)).await.unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::NotFound(_))));
    }
}
