//! Active flows keyed by flow id
//!
//! A flow that ends in `CreateEntry` is persisted and loaded into the hub
//! here, so the flows themselves never write to the store. Abandoned flows
//! expire after `max_age`, and at most `MAX_ACTIVE_FLOWS` are kept.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use super::{AbortReason, Flow, FlowInput, FlowResult, PasswordFlow, RegistrationFlow};
use crate::error::{FlowError, StoreError};
use crate::hub::Hub;
use crate::models::{DeviceRecord, Integration};
use crate::store::ConfigStore;

pub const MAX_ACTIVE_FLOWS: usize = 32;
pub const DEFAULT_FLOW_AGE: Duration = Duration::from_secs(30 * 60);

struct ActiveFlow {
    flow: Box<dyn Flow>,
    started_at: Instant,
    /// Start order, oldest first
    seq: u64,
}

pub struct FlowManager {
    store: Arc<ConfigStore>,
    hub: Arc<Hub>,
    max_age: Duration,
    flows: Mutex<HashMap<String, ActiveFlow>>,
}

impl FlowManager {
    pub fn new(store: Arc<ConfigStore>, hub: Arc<Hub>) -> Self {
        Self {
            store,
            hub,
            max_age: DEFAULT_FLOW_AGE,
            flows: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    fn expired(&self, active: &ActiveFlow) -> bool {
        active.started_at.elapsed() >= self.max_age
    }

    pub async fn start(&self, integration: Integration) -> Result<(String, FlowResult), FlowError> {
        let connector = self.hub.connector();
        let flow: Box<dyn Flow> = match integration {
            Integration::Vorwerk => Box::new(RegistrationFlow::new(
                Arc::new(connector.vorwerk_account()?),
                self.store.clone(),
            )),
            Integration::JDownloader => Box::new(PasswordFlow::new(
                Arc::new(connector.jdownloader_account()?),
                self.store.clone(),
            )),
        };
        Ok(self.begin(flow).await)
    }

    /// Track a flow and return its first form
    pub async fn begin(&self, flow: Box<dyn Flow>) -> (String, FlowResult) {
        let flow_id = uuid::Uuid::new_v4().to_string();
        let result = flow.start();
        tracing::debug!("Started {} flow {}", flow.integration(), flow_id);

        let mut flows = self.flows.lock().await;
        flows.retain(|_, active| !self.expired(active));
        let seq = flows.values().map(|a| a.seq + 1).max().unwrap_or(0);
        while flows.len() >= MAX_ACTIVE_FLOWS {
            let oldest = flows
                .iter()
                .min_by_key(|(_, active)| active.seq)
                .map(|(id, _)| id.clone());
            let Some(oldest) = oldest else { break };
            flows.remove(&oldest);
            tracing::debug!("Dropped flow {} to make room", oldest);
        }

        flows.insert(
            flow_id.clone(),
            ActiveFlow {
                flow,
                started_at: Instant::now(),
                seq,
            },
        );
        (flow_id, result)
    }

    /// Feed input to a flow; finished flows are dropped
    pub async fn progress(&self, flow_id: &str, input: FlowInput) -> Result<FlowResult, FlowError> {
        let mut active = self
            .flows
            .lock()
            .await
            .remove(flow_id)
            .filter(|active| !self.expired(active))
            .ok_or_else(|| FlowError::NotFound(flow_id.to_string()))?;

        let result = active.flow.handle(input).await?;
        if let FlowResult::Form { .. } = result {
            self.flows.lock().await.insert(flow_id.to_string(), active);
            return Ok(result);
        }

        self.finish(result).await
    }

    /// Create the configured-robots entry unless it exists
    pub async fn import_robots(&self, devices: Vec<DeviceRecord>) -> Result<FlowResult, FlowError> {
        let result = RegistrationFlow::import(&self.store, devices).await;
        self.finish(result).await
    }

    async fn finish(&self, result: FlowResult) -> Result<FlowResult, FlowError> {
        let FlowResult::CreateEntry { entry } = result else {
            return Ok(result);
        };

        let entry = match self.store.insert(entry).await {
            Ok(entry) => entry,
            Err(StoreError::Duplicate { .. }) => {
                return Ok(FlowResult::abort(AbortReason::AlreadyConfigured));
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = self.hub.load_entry(&entry).await {
            tracing::error!("Failed to load entry '{}': {}", entry.title, e);
        }

        Ok(FlowResult::CreateEntry { entry })
    }

    pub async fn active(&self) -> usize {
        let mut flows = self.flows.lock().await;
        flows.retain(|_, active| !self.expired(active));
        flows.len()
    }
}
