//! On/off adapter over a device capability

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{Capability, DeviceApi, Entity, EntityInfo};
use crate::error::{AdapterError, RemoteError};
use crate::models::{EntitySnapshot, Platform, SwitchState};

pub struct SwitchEntity {
    info: EntityInfo,
    capability: Capability,
    api: Arc<dyn DeviceApi>,
    state: SwitchState,
    available: bool,
}

impl SwitchEntity {
    pub fn new(
        domain: &str,
        capability: Capability,
        device_name: &str,
        device_serial: &str,
        api: Arc<dyn DeviceApi>,
    ) -> Self {
        let spec = capability.spec();
        let info = EntityInfo::new(
            domain,
            Platform::Switch,
            spec.key,
            spec.name_template,
            device_name,
            device_serial,
        )
        .icon(Some(spec.icon));

        Self {
            info,
            capability,
            api,
            state: SwitchState::Unknown,
            available: true,
        }
    }

    pub fn state(&self) -> SwitchState {
        self.state
    }

    pub async fn turn_on(&mut self) -> Result<(), RemoteError> {
        self.command(true).await
    }

    pub async fn turn_off(&mut self) -> Result<(), RemoteError> {
        self.command(false).await
    }

    /// A failed command keeps the logical state and only drops availability
    async fn command(&mut self, enable: bool) -> Result<(), RemoteError> {
        let spec = self.capability.spec();
        let op = if enable { spec.enable } else { spec.disable };

        match self.api.call(op.name, &op.args()).await {
            Ok(_) => {
                self.state = SwitchState::from(enable);
                self.available = true;
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    "An error occurred while turning {} {}: {}",
                    if enable { "on" } else { "off" },
                    self.info.name,
                    e
                );
                self.available = false;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Entity for SwitchEntity {
    fn info(&self) -> &EntityInfo {
        &self.info
    }

    fn available(&self) -> bool {
        self.available
    }

    fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            unique_id: self.info.unique_id.clone(),
            name: self.info.name.clone(),
            platform: self.info.platform,
            device_serial: self.info.device_serial.clone(),
            icon: self.info.icon,
            unit: None,
            enabled_default: self.info.enabled_default,
            available: self.available,
            state: json!(self.state),
            attributes: json!({ "capability": self.capability }),
        }
    }

    /// Transport and auth failures leave the state untouched. A reply of the
    /// wrong shape means the device no longer reports this value, so the
    /// state degrades to `Unknown` before the error is returned.
    async fn refresh(&mut self) -> Result<(), AdapterError> {
        let spec = self.capability.spec();
        let value = self.api.call(spec.query.name, &spec.query.args()).await?;

        match (spec.map_state)(&value) {
            Ok(state) => {
                self.state = state;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("{} returned an unexpected value: {}", self.info.name, e);
                self.state = SwitchState::Unknown;
                Err(e)
            }
        }
    }

    fn as_switch_mut(&mut self) -> Option<&mut SwitchEntity> {
        Some(self)
    }
}
