//! Hub: loaded config entries and their entities
//!
//! Each stored entry is turned into vendor clients (via `Connector`) and a
//! set of entities. Entities sit behind their own mutex so the poller and
//! API handlers only ever hold one at a time; lookups by unique id never
//! lock an entity. Entries with a device directory re-list their devices
//! once per poll tick.

pub mod connector;

pub use connector::{Connection, Connector};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::entity::{Capability, DeviceApi, DeviceDirectory, Entity, Sensor, SensorKind, SwitchEntity};
use crate::error::{HubError, RemoteError};
use crate::jdownloader::DeviceService;
use crate::models::{ConfigEntry, DeviceRecord, EntitySnapshot, Integration};
use crate::session::CloudSession;

pub type SharedEntity = Arc<Mutex<Box<dyn Entity>>>;

/// Entity plus the identity read without locking it
#[derive(Clone)]
struct HubEntity {
    unique_id: String,
    device_serial: String,
    entity: SharedEntity,
}

impl HubEntity {
    fn wrap(entity: Box<dyn Entity>) -> Self {
        let info = entity.info();
        Self {
            unique_id: info.unique_id.clone(),
            device_serial: info.device_serial.clone(),
            entity: Arc::new(Mutex::new(entity)),
        }
    }
}

struct LoadedEntry {
    integration: Integration,
    session: Option<Arc<CloudSession>>,
    directory: Option<Arc<dyn DeviceDirectory>>,
    /// serial → device client
    devices: HashMap<String, Arc<dyn DeviceApi>>,
    /// Serials from the last successful listing; `None` means all present
    present: Option<HashSet<String>>,
    entities: Vec<HubEntity>,
}

impl LoadedEntry {
    fn is_present(&self, serial: &str) -> bool {
        self.present.as_ref().map_or(true, |p| p.contains(serial))
    }
}

/// Switches and sensors for the devices of one entry
pub fn build_entities(
    integration: Integration,
    devices: &[(DeviceRecord, Arc<dyn DeviceApi>)],
) -> Vec<Box<dyn Entity>> {
    let domain = integration.domain();
    let (capabilities, sensors): (&[Capability], &[SensorKind]) = match integration {
        Integration::JDownloader => (
            &[Capability::Pause, Capability::Limit][..],
            &SensorKind::JDOWNLOADER[..],
        ),
        Integration::Vorwerk => (&[Capability::Schedule][..], &SensorKind::ROBOT[..]),
    };

    let mut entities: Vec<Box<dyn Entity>> = Vec::new();
    for (record, api) in devices {
        for capability in capabilities {
            entities.push(Box::new(SwitchEntity::new(
                domain,
                *capability,
                &record.name,
                &record.serial,
                api.clone(),
            )));
        }
        for kind in sensors {
            entities.push(Box::new(Sensor::new(
                domain,
                *kind,
                &record.name,
                &record.serial,
                api.clone(),
            )));
        }
    }
    entities
}

pub struct Hub {
    connector: Connector,
    entries: RwLock<HashMap<String, LoadedEntry>>,
}

impl Hub {
    pub fn new(connector: Connector) -> Self {
        Self {
            connector,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn connector(&self) -> &Connector {
        &self.connector
    }

    /// Returns the number of entities created
    pub async fn load_entry(&self, entry: &ConfigEntry) -> Result<usize, RemoteError> {
        let connection = self.connector.connect(entry).await?;
        Ok(self.attach(entry, connection).await)
    }

    /// Register already connected clients for an entry
    pub async fn attach(&self, entry: &ConfigEntry, connection: Connection) -> usize {
        let entities: Vec<HubEntity> = build_entities(entry.integration, &connection.devices)
            .into_iter()
            .map(HubEntity::wrap)
            .collect();
        let count = entities.len();

        let loaded = LoadedEntry {
            integration: entry.integration,
            session: connection.session,
            directory: connection.directory,
            devices: connection
                .devices
                .into_iter()
                .map(|(record, api)| (record.serial, api))
                .collect(),
            present: None,
            entities,
        };

        self.entries
            .write()
            .await
            .insert(entry.entry_id.clone(), loaded);

        tracing::info!(
            "[Hub] Loaded {} entry '{}' with {} entities",
            entry.integration,
            entry.title,
            count
        );
        count
    }

    pub async fn unload_entry(&self, entry_id: &str) -> bool {
        let removed = self.entries.write().await.remove(entry_id).is_some();
        if removed {
            tracing::info!("[Hub] Unloaded entry {}", entry_id);
        }
        removed
    }

    /// Re-list the devices of every entry that has a directory
    pub async fn sync_devices(&self) {
        let directories: Vec<(String, Arc<dyn DeviceDirectory>)> = self
            .entries
            .read()
            .await
            .iter()
            .filter_map(|(id, e)| e.directory.clone().map(|d| (id.clone(), d)))
            .collect();

        for (entry_id, directory) in directories {
            match directory.list().await {
                Ok(records) => self.apply_device_list(&entry_id, directory.as_ref(), records).await,
                Err(e) => tracing::warn!("[Hub] Failed to list devices of entry {}: {}", entry_id, e),
            }
        }
    }

    async fn apply_device_list(
        &self,
        entry_id: &str,
        directory: &dyn DeviceDirectory,
        records: Vec<DeviceRecord>,
    ) {
        let mut entries = self.entries.write().await;
        let Some(loaded) = entries.get_mut(entry_id) else {
            return;
        };

        let added: Vec<(DeviceRecord, Arc<dyn DeviceApi>)> = records
            .iter()
            .filter(|r| !loaded.devices.contains_key(&r.serial))
            .map(|r| (r.clone(), directory.client(&r.serial)))
            .collect();
        for (record, _) in &added {
            tracing::info!("[Hub] New device '{}' on entry {}", record.name, entry_id);
        }
        loaded
            .entities
            .extend(build_entities(loaded.integration, &added).into_iter().map(HubEntity::wrap));
        loaded
            .devices
            .extend(added.into_iter().map(|(record, api)| (record.serial, api)));

        let present: HashSet<String> = records.into_iter().map(|r| r.serial).collect();
        for serial in loaded.devices.keys() {
            if !present.contains(serial) && loaded.is_present(serial) {
                tracing::info!("[Hub] Device {} is no longer listed", serial);
            }
        }
        loaded.present = Some(present);
    }

    pub async fn entities(&self) -> Vec<SharedEntity> {
        self.entries
            .read()
            .await
            .values()
            .flat_map(|e| e.entities.iter().map(|h| h.entity.clone()))
            .collect()
    }

    /// Every entity with whether its device was in the last listing
    pub async fn poll_targets(&self) -> Vec<(SharedEntity, bool)> {
        self.entries
            .read()
            .await
            .values()
            .flat_map(|e| {
                e.entities
                    .iter()
                    .map(move |h| (h.entity.clone(), e.is_present(&h.device_serial)))
            })
            .collect()
    }

    pub async fn snapshots(&self) -> Vec<EntitySnapshot> {
        let mut snapshots = Vec::new();
        for entity in self.entities().await {
            snapshots.push(entity.lock().await.snapshot());
        }
        snapshots.sort_by(|a, b| a.unique_id.cmp(&b.unique_id));
        snapshots
    }

    async fn lookup(&self, unique_id: &str) -> Option<HubEntity> {
        self.entries
            .read()
            .await
            .values()
            .flat_map(|e| e.entities.iter())
            .find(|h| h.unique_id == unique_id)
            .cloned()
    }

    pub async fn find(&self, unique_id: &str) -> Option<SharedEntity> {
        self.lookup(unique_id).await.map(|h| h.entity)
    }

    /// Entry sessions, for persisting refreshed tokens
    pub async fn sessions(&self) -> Vec<(String, Arc<CloudSession>)> {
        self.entries
            .read()
            .await
            .iter()
            .filter_map(|(id, e)| e.session.clone().map(|s| (id.clone(), s)))
            .collect()
    }

    pub async fn turn(&self, unique_id: &str, on: bool) -> Result<EntitySnapshot, HubError> {
        let entity = self
            .find(unique_id)
            .await
            .ok_or_else(|| HubError::UnknownEntity(unique_id.to_string()))?;
        let mut entity = entity.lock().await;

        let switch = entity
            .as_switch_mut()
            .ok_or_else(|| HubError::NotASwitch(unique_id.to_string()))?;
        if on {
            switch.turn_on().await?;
        } else {
            switch.turn_off().await?;
        }
        Ok(entity.snapshot())
    }

    /// Run a device service on the device behind `unique_id`
    pub async fn call_service(&self, unique_id: &str, service: &str) -> Result<(), HubError> {
        let service: DeviceService = service
            .parse()
            .map_err(|_| HubError::UnknownService(service.to_string()))?;

        let serial = self
            .lookup(unique_id)
            .await
            .ok_or_else(|| HubError::UnknownEntity(unique_id.to_string()))?
            .device_serial;

        let api = {
            let entries = self.entries.read().await;
            entries
                .values()
                .filter(|e| e.integration == Integration::JDownloader)
                .find_map(|e| e.devices.get(&serial).cloned())
                .ok_or_else(|| HubError::Unsupported(serial.clone()))?
        };

        tracing::info!("[Hub] Calling {} on device {}", service.as_str(), serial);
        api.call(service.operation(), &[]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::entity::testing::{FakeDevice, FakeDirectory};
    use crate::jdownloader::{OP_LIMIT_ENABLE, OP_RUN_UPDATE_CHECK};
    use crate::models::{Account, Platform, SwitchState};
    use serde_json::json;

    fn hub() -> Hub {
        Hub::new(Connector::new(&Config::default()).unwrap())
    }

    fn entry(integration: Integration) -> ConfigEntry {
        ConfigEntry::new(
            integration,
            "test",
            "test",
            Account {
                identifier: None,
                token: None,
                devices: vec![],
            },
        )
    }

    fn connection(device: Arc<FakeDevice>) -> Connection {
        let api: Arc<dyn DeviceApi> = device;
        Connection {
            session: None,
            directory: None,
            devices: vec![(DeviceRecord::new("Office", "abc"), api)],
        }
    }

    #[test]
    fn test_build_entities_per_integration() {
        let device: Arc<dyn DeviceApi> = Arc::new(FakeDevice::default());
        let devices = vec![(DeviceRecord::new("Office", "abc"), device)];

        let jd = build_entities(Integration::JDownloader, &devices);
        assert_eq!(jd.len(), 7);
        assert_eq!(jd.iter().filter(|e| e.info().platform == Platform::Switch).count(), 2);
        assert_eq!(
            jd.iter().filter(|e| e.info().platform == Platform::BinarySensor).count(),
            1
        );

        let robot = build_entities(Integration::Vorwerk, &devices);
        let names: Vec<_> = robot.iter().map(|e| e.info().name.clone()).collect();
        assert_eq!(names, vec!["Office Schedule", "Office Status", "Office Battery"]);
    }

    #[tokio::test]
    async fn test_turn_on_switch() {
        let hub = hub();
        let device = Arc::new(FakeDevice::default().reply(OP_LIMIT_ENABLE, Ok(json!(true))));
        hub.attach(&entry(Integration::JDownloader), connection(device)).await;

        let id = "myjdownloader_JDownloader Office Limit_switch_limit";
        let snapshot = hub.turn(id, true).await.unwrap();
        assert_eq!(snapshot.state, json!(SwitchState::On));

        let sensor = "myjdownloader_JDownloader Office Status_sensor_status";
        assert!(matches!(hub.turn(sensor, true).await, Err(HubError::NotASwitch(_))));
        assert!(matches!(hub.turn("nope", true).await, Err(HubError::UnknownEntity(_))));
    }

    #[tokio::test]
    async fn test_call_service() {
        let hub = hub();
        let device = Arc::new(FakeDevice::default().reply(OP_RUN_UPDATE_CHECK, Ok(json!(null))));
        hub.attach(&entry(Integration::JDownloader), connection(device.clone())).await;

        let id = "myjdownloader_JDownloader Office Status_sensor_status";
        hub.call_service(id, "run_update_check").await.unwrap();
        assert_eq!(device.calls()[0].0, OP_RUN_UPDATE_CHECK);

        assert!(matches!(
            hub.call_service(id, "self_destruct").await,
            Err(HubError::UnknownService(_))
        ));
    }

    #[tokio::test]
    async fn test_services_need_a_download_manager() {
        let hub = hub();
        hub.attach(&entry(Integration::Vorwerk), connection(Arc::new(FakeDevice::default())))
            .await;

        assert!(matches!(
            hub.call_service("vorwerk_Office Status_sensor_status", "start_downloads").await,
            Err(HubError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_device_listing_tracks_presence_and_new_devices() {
        let hub = hub();
        let directory = Arc::new(FakeDirectory::listing(vec![DeviceRecord::new("Office", "abc")]));
        let mut conn = connection(Arc::new(FakeDevice::default()));
        let listing: Arc<dyn DeviceDirectory> = directory.clone();
        conn.directory = Some(listing);
        hub.attach(&entry(Integration::JDownloader), conn).await;

        // Nothing listed yet: every device counts as present
        assert!(hub.poll_targets().await.iter().all(|(_, present)| *present));

        directory.set_listing(Ok(vec![DeviceRecord::new("Attic", "xyz")]));
        hub.sync_devices().await;

        let targets = hub.poll_targets().await;
        assert_eq!(targets.len(), 14);
        assert_eq!(targets.iter().filter(|(_, present)| *present).count(), 7);
        assert!(hub
            .find("myjdownloader_JDownloader Attic Pause_switch_pause")
            .await
            .is_some());

        // A failed listing keeps the last known devices
        directory.set_listing(Err(RemoteError::Transport("down".into())));
        hub.sync_devices().await;
        let targets = hub.poll_targets().await;
        assert_eq!(targets.len(), 14);
        assert_eq!(targets.iter().filter(|(_, present)| *present).count(), 7);
    }

    #[tokio::test]
    async fn test_find_does_not_wait_for_busy_entity() {
        let hub = hub();
        hub.attach(&entry(Integration::JDownloader), connection(Arc::new(FakeDevice::default())))
            .await;

        let id = "myjdownloader_JDownloader Office Pause_switch_pause";
        let entity = hub.find(id).await.unwrap();
        let _busy = entity.lock().await;

        let other = "myjdownloader_JDownloader Office Limit_switch_limit";
        let found = tokio::time::timeout(std::time::Duration::from_secs(1), hub.find(other)).await;
        assert!(matches!(found, Ok(Some(_))));
        let found = tokio::time::timeout(std::time::Duration::from_secs(1), hub.find(id)).await;
        assert!(matches!(found, Ok(Some(_))));
    }

    #[tokio::test]
    async fn test_unload_removes_entities() {
        let hub = hub();
        let entry = entry(Integration::JDownloader);
        hub.attach(&entry, connection(Arc::new(FakeDevice::default()))).await;
        assert_eq!(hub.snapshots().await.len(), 7);

        assert!(hub.unload_entry(&entry.entry_id).await);
        assert!(hub.entities().await.is_empty());
        assert!(!hub.unload_entry(&entry.entry_id).await);
    }
}
