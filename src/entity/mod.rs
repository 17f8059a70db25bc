//! Entities exposed per device
//!
//! - `capability`: switch variants (remote operations + value mapping)
//! - `coordinator`: one state read shared by all entities of a device
//! - `switch`: on/off adapter over a capability
//! - `sensor`: read-only values

pub mod capability;
pub mod coordinator;
pub mod sensor;
pub mod switch;

pub use self::capability::Capability;
pub use self::coordinator::SharedQuery;
pub use self::sensor::{Sensor, SensorKind};
pub use self::switch::SwitchEntity;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AdapterError, RemoteError};
use crate::models::{DeviceRecord, EntitySnapshot, Platform};

/// Named remote operation on one device
#[async_trait]
pub trait DeviceApi: Send + Sync {
    async fn call(&self, operation: &str, args: &[Value]) -> Result<Value, RemoteError>;
}

/// Devices currently registered on an account
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    async fn list(&self) -> Result<Vec<DeviceRecord>, RemoteError>;

    /// Client for a device reported by `list`
    fn client(&self, serial: &str) -> Arc<dyn DeviceApi>;
}

/// A remote operation plus its optional boolean argument
#[derive(Debug, Clone, Copy)]
pub struct Operation {
    pub name: &'static str,
    pub arg: Option<bool>,
}

impl Operation {
    pub const fn new(name: &'static str) -> Self {
        Self { name, arg: None }
    }

    pub const fn with_arg(name: &'static str, arg: bool) -> Self {
        Self {
            name,
            arg: Some(arg),
        }
    }

    pub fn args(&self) -> Vec<Value> {
        self.arg.map(Value::Bool).into_iter().collect()
    }
}

/// Identity shared by every entity kind
#[derive(Debug, Clone)]
pub struct EntityInfo {
    pub unique_id: String,
    pub name: String,
    pub platform: Platform,
    pub device_serial: String,
    pub icon: Option<&'static str>,
    pub enabled_default: bool,
}

impl EntityInfo {
    /// `name_template` carries a `{device}` placeholder
    pub fn new(
        domain: &str,
        platform: Platform,
        key: &str,
        name_template: &str,
        device_name: &str,
        device_serial: &str,
    ) -> Self {
        let name = name_template.replace("{device}", device_name);
        Self {
            unique_id: unique_id(domain, &name, platform, key),
            name,
            platform,
            device_serial: device_serial.to_string(),
            icon: None,
            enabled_default: true,
        }
    }

    pub fn icon(mut self, icon: Option<&'static str>) -> Self {
        self.icon = icon;
        self
    }

    pub fn enabled_default(mut self, enabled: bool) -> Self {
        self.enabled_default = enabled;
        self
    }
}

pub fn unique_id(domain: &str, name: &str, platform: Platform, key: &str) -> String {
    [domain, name, platform.as_str(), key].join("_")
}

#[async_trait]
pub trait Entity: Send + Sync {
    fn info(&self) -> &EntityInfo;

    fn available(&self) -> bool;

    fn set_available(&mut self, available: bool);

    fn snapshot(&self) -> EntitySnapshot;

    /// One best-effort read of the remote state
    async fn refresh(&mut self) -> Result<(), AdapterError>;

    /// Polling boundary: a failed refresh only marks this entity unavailable
    async fn update(&mut self) {
        match self.refresh().await {
            Ok(()) => self.set_available(true),
            Err(e) => {
                if self.available() {
                    tracing::debug!(
                        "An error occurred while updating {}: {}",
                        self.info().name,
                        e
                    );
                }
                self.set_available(false);
            }
        }
    }

    fn as_switch_mut(&mut self) -> Option<&mut SwitchEntity> {
        None
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Scripted device: answers per operation, records every call
    #[derive(Default)]
    pub struct FakeDevice {
        replies: Mutex<HashMap<&'static str, Result<Value, RemoteError>>>,
        pub calls: Mutex<Vec<(String, Vec<Value>)>>,
    }

    impl FakeDevice {
        pub fn reply(self, operation: &'static str, reply: Result<Value, RemoteError>) -> Self {
            self.replies.lock().unwrap().insert(operation, reply);
            self
        }

        pub fn set_reply(&self, operation: &'static str, reply: Result<Value, RemoteError>) {
            self.replies.lock().unwrap().insert(operation, reply);
        }

        pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    /// Account listing that tests can change between polls
    pub struct FakeDirectory {
        listing: Mutex<Result<Vec<DeviceRecord>, RemoteError>>,
        pub client: Arc<FakeDevice>,
    }

    impl FakeDirectory {
        pub fn listing(records: Vec<DeviceRecord>) -> Self {
            Self {
                listing: Mutex::new(Ok(records)),
                client: Arc::new(FakeDevice::default()),
            }
        }

        pub fn set_listing(&self, listing: Result<Vec<DeviceRecord>, RemoteError>) {
            *self.listing.lock().unwrap() = listing;
        }
    }

    #[async_trait]
    impl DeviceDirectory for FakeDirectory {
        async fn list(&self) -> Result<Vec<DeviceRecord>, RemoteError> {
            self.listing.lock().unwrap().clone()
        }

        fn client(&self, _serial: &str) -> Arc<dyn DeviceApi> {
            self.client.clone()
        }
    }

    #[async_trait]
    impl DeviceApi for FakeDevice {
        async fn call(&self, operation: &str, args: &[Value]) -> Result<Value, RemoteError> {
            self.calls
                .lock()
                .unwrap()
                .push((operation.to_string(), args.to_vec()));
            self.replies
                .lock()
                .unwrap()
                .get(operation)
                .cloned()
                .unwrap_or_else(|| Err(RemoteError::Transport(format!("no reply for {}", operation))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_id_composition() {
        let info = EntityInfo::new(
            "myjdownloader",
            Platform::Switch,
            "pause",
            "JDownloader {device} Pause",
            "Office",
            "abc",
        );
        assert_eq!(info.name, "JDownloader Office Pause");
        assert_eq!(
            info.unique_id,
            "myjdownloader_JDownloader Office Pause_switch_pause"
        );
    }

    #[test]
    fn test_operation_args() {
        assert!(Operation::new("/x").args().is_empty());
        assert_eq!(
            Operation::with_arg("/x", true).args(),
            vec![Value::Bool(true)]
        );
    }
}
