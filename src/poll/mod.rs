//! Poller: periodic refresh of every loaded entity
//!
//! Runs in a background tokio task. Each tick first re-lists the devices of
//! every account that can list them, then walks the entities one by one; a
//! failing entity only marks itself unavailable and entities of unlisted
//! devices are not called at all. Tokens refreshed by a session during the
//! tick are written back to the store afterwards.

use std::sync::Arc;

use serde::Serialize;
use tokio::time::{self, Duration, MissedTickBehavior};

use crate::hub::Hub;
use crate::store::ConfigStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollSummary {
    pub total: usize,
    pub available: usize,
    pub unavailable: usize,
}

pub struct Poller {
    hub: Arc<Hub>,
    store: Arc<ConfigStore>,
    interval: Duration,
}

impl Poller {
    pub fn new(hub: Arc<Hub>, store: Arc<ConfigStore>, interval: Duration) -> Self {
        Self {
            hub,
            store,
            interval,
        }
    }

    /// Start the background loop (runs forever)
    pub async fn start(self: Arc<Self>) {
        tracing::info!("[Poller] Starting (interval: {}s)", self.interval.as_secs());

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let summary = self.poll_once().await;
            if summary.unavailable > 0 {
                tracing::debug!(
                    "[Poller] {} of {} entities unavailable",
                    summary.unavailable,
                    summary.total
                );
            }
            self.sync_tokens().await;
        }
    }

    pub async fn poll_once(&self) -> PollSummary {
        let mut summary = PollSummary::default();
        self.hub.sync_devices().await;

        for (entity, present) in self.hub.poll_targets().await {
            let mut entity = entity.lock().await;
            if present {
                entity.update().await;
            } else {
                entity.set_available(false);
            }

            summary.total += 1;
            if entity.available() {
                summary.available += 1;
            } else {
                summary.unavailable += 1;
            }
        }

        summary
    }

    /// Persist tokens that differ from the stored ones
    pub async fn sync_tokens(&self) {
        for (entry_id, session) in self.hub.sessions().await {
            let Some(token) = session.token().await else {
                continue;
            };
            match self.store.update_token(&entry_id, token).await {
                Ok(true) => tracing::info!("[Poller] Saved refreshed token for entry {}", entry_id),
                Ok(false) => {}
                Err(e) => tracing::warn!("[Poller] Failed to save token for {}: {}", entry_id, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::entity::testing::{FakeDevice, FakeDirectory};
    use crate::entity::{DeviceApi, DeviceDirectory, SharedQuery};
    use crate::vorwerk::robot::CMD_GET_ROBOT_STATE;
    use crate::error::RemoteError;
    use crate::hub::{Connection, Connector};
    use crate::jdownloader::{OP_CURRENT_STATE, OP_LIMIT_STATUS, OP_QUERY_LINKS, OP_QUERY_PACKAGES, OP_SPEED, OP_UPDATE_AVAILABLE};
    use crate::models::{Account, ConfigEntry, DeviceRecord, Integration, Token};
    use crate::session::CloudSession;
    use serde_json::json;

    fn entry() -> ConfigEntry {
        ConfigEntry::new(
            Integration::JDownloader,
            "MyJDownloader",
            "me@example.com",
            Account {
                identifier: Some("me@example.com".into()),
                token: Some(Token::new("old")),
                devices: vec![],
            },
        )
    }

    fn hub() -> Arc<Hub> {
        Arc::new(Hub::new(Connector::new(&Config::default()).unwrap()))
    }

    #[tokio::test]
    async fn test_one_failure_does_not_affect_others() {
        let hub = hub();
        let device = Arc::new(
            FakeDevice::default()
                .reply(OP_CURRENT_STATE, Ok(json!("RUNNING")))
                .reply(OP_LIMIT_STATUS, Err(RemoteError::Transport("timeout".into())))
                .reply(OP_SPEED, Ok(json!(1_500_000)))
                .reply(OP_QUERY_PACKAGES, Ok(json!([])))
                .reply(OP_QUERY_LINKS, Ok(json!([])))
                .reply(OP_UPDATE_AVAILABLE, Ok(json!(false))),
        );
        let api: Arc<dyn DeviceApi> = device;
        hub.attach(
            &entry(),
            Connection {
                session: None,
                directory: None,
                devices: vec![(DeviceRecord::new("Office", "abc"), api)],
            },
        )
        .await;

        let poller = Poller::new(hub.clone(), Arc::new(ConfigStore::in_memory()), Duration::from_secs(60));
        let summary = poller.poll_once().await;
        assert_eq!(
            summary,
            PollSummary {
                total: 7,
                available: 6,
                unavailable: 1
            }
        );

        let limit = hub
            .find("myjdownloader_JDownloader Office Limit_switch_limit")
            .await
            .unwrap();
        assert!(!limit.lock().await.available());

        let speed = hub
            .find("myjdownloader_JDownloader Office Download Speed_sensor_download_speed")
            .await
            .unwrap();
        assert_eq!(speed.lock().await.snapshot().state, json!(1.5));
    }

    #[tokio::test]
    async fn test_unlisted_device_is_not_called() {
        let hub = hub();
        let device = Arc::new(FakeDevice::default().reply(OP_CURRENT_STATE, Ok(json!("RUNNING"))));
        let api: Arc<dyn DeviceApi> = device.clone();
        let directory = Arc::new(FakeDirectory::listing(vec![]));
        let listing: Arc<dyn DeviceDirectory> = directory.clone();
        hub.attach(
            &entry(),
            Connection {
                session: None,
                directory: Some(listing),
                devices: vec![(DeviceRecord::new("Office", "abc"), api)],
            },
        )
        .await;

        let poller = Poller::new(hub.clone(), Arc::new(ConfigStore::in_memory()), Duration::from_secs(60));
        let summary = poller.poll_once().await;
        assert_eq!(summary.unavailable, 7);
        assert!(device.calls().is_empty());

        // Listed again on a later tick
        directory.set_listing(Ok(vec![DeviceRecord::new("Office", "abc")]));
        poller.poll_once().await;
        assert!(!device.calls().is_empty());
        let status = hub
            .find("myjdownloader_JDownloader Office Status_sensor_status")
            .await
            .unwrap();
        assert!(status.lock().await.available());
    }

    #[tokio::test]
    async fn test_robot_entities_share_one_state_read() {
        let hub = hub();
        let device = Arc::new(FakeDevice::default().reply(
            CMD_GET_ROBOT_STATE,
            Ok(json!({
                "state": 1,
                "action": 0,
                "details": {"isDocked": true, "isCharging": false, "charge": 80, "isScheduleEnabled": true}
            })),
        ));
        let inner: Arc<dyn DeviceApi> = device.clone();
        let api: Arc<dyn DeviceApi> = Arc::new(SharedQuery::new(inner, CMD_GET_ROBOT_STATE, Duration::from_secs(30)));
        let mut robots = entry();
        robots.integration = Integration::Vorwerk;
        hub.attach(
            &robots,
            Connection {
                session: None,
                directory: None,
                devices: vec![(DeviceRecord::new("Kobold", "S1"), api)],
            },
        )
        .await;

        let poller = Poller::new(hub, Arc::new(ConfigStore::in_memory()), Duration::from_secs(60));
        let summary = poller.poll_once().await;
        assert_eq!(summary.available, 3);
        assert_eq!(device.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_refreshed_token_is_persisted() {
        let hub = hub();
        let store = Arc::new(ConfigStore::in_memory());
        let entry = store.insert(entry()).await.unwrap();

        let session = Arc::new(
            CloudSession::new(reqwest::Client::new(), "https://api.example.com", "Bearer").unwrap(),
        );
        session.set_token(Token::new("new")).await;
        hub.attach(
            &entry,
            Connection {
                session: Some(session),
                directory: None,
                devices: vec![],
            },
        )
        .await;

        let poller = Poller::new(hub, store.clone(), Duration::from_secs(60));
        poller.sync_tokens().await;

        let stored = store.get(&entry.entry_id).await.unwrap();
        assert_eq!(stored.account.token, Some(Token::new("new")));
    }
}
