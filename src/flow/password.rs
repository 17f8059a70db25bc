//! E-mail + password registration for MyJDownloader accounts

use std::sync::Arc;

use async_trait::async_trait;

use super::{field, AbortReason, Flow, FlowErrorCode, FlowInput, FlowResult, PasswordBackend, STEP_USER};
use crate::error::{FlowError, RemoteError};
use crate::jdownloader::ENTRY_TITLE;
use crate::models::{Account, ConfigEntry, Integration};
use crate::store::ConfigStore;

pub struct PasswordFlow {
    backend: Arc<dyn PasswordBackend>,
    store: Arc<ConfigStore>,
    finished: bool,
}

impl PasswordFlow {
    pub fn new(backend: Arc<dyn PasswordBackend>, store: Arc<ConfigStore>) -> Self {
        Self {
            backend,
            store,
            finished: false,
        }
    }

    pub async fn submit(&mut self, identifier: Option<String>, password: Option<String>) -> Result<FlowResult, FlowError> {
        if self.finished {
            return Err(FlowError::Finished);
        }
        // Passwords are sent exactly as typed
        let password = password.filter(|p| !p.is_empty());
        let (Some(identifier), Some(password)) = (field(identifier), password) else {
            return Ok(FlowResult::form(STEP_USER));
        };
        let identifier = identifier.to_lowercase();

        if self.store.contains(Integration::JDownloader, &identifier).await {
            self.finished = true;
            return Ok(FlowResult::abort(AbortReason::AlreadyConfigured));
        }

        match self.connect(&identifier, &password).await {
            Ok(account) => {
                self.finished = true;
                let entry = ConfigEntry::new(Integration::JDownloader, ENTRY_TITLE, identifier, account);
                Ok(FlowResult::CreateEntry { entry })
            }
            Err(e) => {
                let code = FlowErrorCode::from(&e);
                if code == FlowErrorCode::Unknown {
                    tracing::error!("[JDownloader] Unexpected response while logging in: {}", e);
                } else {
                    tracing::warn!("[JDownloader] Login for {} failed: {}", identifier, e);
                }
                Ok(FlowResult::form_error(STEP_USER, code))
            }
        }
    }

    async fn connect(&self, identifier: &str, password: &str) -> Result<Account, RemoteError> {
        let token = self.backend.login(identifier, password).await?;
        let devices = self.backend.devices().await?;
        Ok(Account {
            identifier: Some(identifier.to_string()),
            token: Some(token),
            devices,
        })
    }
}

#[async_trait]
impl Flow for PasswordFlow {
    fn integration(&self) -> Integration {
        Integration::JDownloader
    }

    fn start(&self) -> FlowResult {
        FlowResult::form(STEP_USER)
    }

    async fn handle(&mut self, input: FlowInput) -> Result<FlowResult, FlowError> {
        self.submit(input.identifier, input.password).await
    }
}
