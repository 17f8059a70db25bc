//! One-time-code registration for Vorwerk accounts

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{field, AbortReason, AccountBackend, Flow, FlowErrorCode, FlowInput, FlowResult, STEP_CODE, STEP_USER};
use crate::error::{FlowError, RemoteError};
use crate::models::{Account, ConfigEntry, DeviceRecord, Integration, PersistentMap};
use crate::store::ConfigStore;
use crate::vorwerk::IMPORT_UNIQUE_ID;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowStep {
    AwaitIdentifier,
    AwaitOneTimeCode { identifier: String },
    Done,
    Aborted,
}

pub struct RegistrationFlow {
    backend: Arc<dyn AccountBackend>,
    store: Arc<ConfigStore>,
    step: FlowStep,
}

impl RegistrationFlow {
    pub fn new(backend: Arc<dyn AccountBackend>, store: Arc<ConfigStore>) -> Self {
        Self {
            backend,
            store,
            step: FlowStep::AwaitIdentifier,
        }
    }

    pub fn step(&self) -> &FlowStep {
        &self.step
    }

    /// Duplicates abort before any remote call
    pub async fn submit_identifier(&mut self, identifier: Option<String>) -> Result<FlowResult, FlowError> {
        if self.step != FlowStep::AwaitIdentifier {
            return Err(FlowError::Finished);
        }
        let Some(identifier) = field(identifier) else {
            return Ok(FlowResult::form(STEP_USER));
        };

        if self.store.contains(Integration::Vorwerk, &identifier).await {
            tracing::info!("[Vorwerk] {} is already configured", identifier);
            self.step = FlowStep::Aborted;
            return Ok(FlowResult::abort(AbortReason::AlreadyConfigured));
        }

        self.step = FlowStep::AwaitOneTimeCode { identifier };
        self.submit_code(None).await
    }

    /// Without a code the code is (re)sent; a rejected code keeps the step
    pub async fn submit_code(&mut self, code: Option<String>) -> Result<FlowResult, FlowError> {
        let identifier = match &self.step {
            FlowStep::AwaitOneTimeCode { identifier } => identifier.clone(),
            FlowStep::AwaitIdentifier => return Err(FlowError::MissingInput("identifier")),
            FlowStep::Done | FlowStep::Aborted => return Err(FlowError::Finished),
        };

        let Some(code) = field(code) else {
            return Ok(match self.backend.send_code(&identifier).await {
                Ok(()) => FlowResult::form(STEP_CODE),
                Err(e) => {
                    tracing::warn!("[Vorwerk] Failed to send code to {}: {}", identifier, e);
                    FlowResult::form_error(STEP_CODE, FlowErrorCode::CannotConnect)
                }
            });
        };

        match self.complete(&identifier, &code).await {
            Ok(account) => {
                self.step = FlowStep::Done;
                let entry = ConfigEntry::new(Integration::Vorwerk, identifier.clone(), identifier, account);
                Ok(FlowResult::CreateEntry { entry })
            }
            Err(e) => {
                tracing::warn!("[Vorwerk] Registration of {} failed: {}", identifier, e);
                Ok(FlowResult::form_error(STEP_CODE, FlowErrorCode::InvalidAuth))
            }
        }
    }

    async fn complete(&self, identifier: &str, code: &str) -> Result<Account, RemoteError> {
        let token = self.backend.exchange_code(identifier, code).await?;
        let devices = self.backend.devices().await?;
        let maps = self.backend.persistent_maps(&devices).await?;
        let devices = merge_persistent_maps(self.backend.as_ref(), devices, maps).await?;

        tracing::debug!("[Vorwerk] Registered {} robots for {}", devices.len(), identifier);

        Ok(Account {
            identifier: Some(identifier.to_string()),
            token: Some(token),
            devices,
        })
    }

    /// Entry for robots listed in the configuration file; no authentication
    pub async fn import(store: &ConfigStore, devices: Vec<DeviceRecord>) -> FlowResult {
        if store.contains(Integration::Vorwerk, IMPORT_UNIQUE_ID).await {
            return FlowResult::abort(AbortReason::AlreadyConfigured);
        }

        tracing::info!("Creating new Vorwerk robot config entry");
        let account = Account {
            identifier: None,
            token: None,
            devices,
        };
        FlowResult::CreateEntry {
            entry: ConfigEntry::new(Integration::Vorwerk, IMPORT_UNIQUE_ID, IMPORT_UNIQUE_ID, account),
        }
    }
}

/// Attach maps to the robot with the same serial, downloading each image.
/// Maps for serials not in `devices` are dropped without being fetched.
pub async fn merge_persistent_maps(
    backend: &dyn AccountBackend,
    mut devices: Vec<DeviceRecord>,
    mut maps: HashMap<String, Vec<Map<String, Value>>>,
) -> Result<Vec<DeviceRecord>, RemoteError> {
    for device in devices.iter_mut() {
        let Some(raw_maps) = maps.remove(&device.serial) else {
            continue;
        };

        let mut merged = Vec::with_capacity(raw_maps.len());
        for raw in raw_maps {
            let url = raw
                .get("url")
                .and_then(Value::as_str)
                .ok_or_else(|| RemoteError::Malformed(format!("Map of {} has no url", device.serial)))?
                .to_string();
            let image = backend.map_image(&url).await?;
            merged.push(PersistentMap::from_remote(raw, image));
        }
        device.persistent_maps = Some(merged);
    }

    for serial in maps.keys() {
        tracing::debug!("Dropping persistent maps of unknown robot {}", serial);
    }

    Ok(devices)
}

#[async_trait]
impl Flow for RegistrationFlow {
    fn integration(&self) -> Integration {
        Integration::Vorwerk
    }

    fn start(&self) -> FlowResult {
        FlowResult::form(STEP_USER)
    }

    async fn handle(&mut self, input: FlowInput) -> Result<FlowResult, FlowError> {
        match self.step {
            FlowStep::AwaitIdentifier => self.submit_identifier(input.identifier).await,
            FlowStep::AwaitOneTimeCode { .. } => self.submit_code(input.code).await,
            FlowStep::Done | FlowStep::Aborted => Err(FlowError::Finished),
        }
    }
}
