//! Builds vendor clients from configuration and stored entries

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::config::{Config, JDownloaderConfig, VorwerkConfig};
use crate::entity::{DeviceApi, DeviceDirectory, SharedQuery};
use crate::error::RemoteError;
use crate::jdownloader::{JdAccount, JdDevice, JdReconnect};
use crate::models::{ConfigEntry, DeviceRecord, Integration};
use crate::session::{http_client, CloudSession};
use crate::vorwerk::account::Auth0Refresher;
use crate::vorwerk::robot::CMD_GET_ROBOT_STATE;
use crate::vorwerk::{RobotClient, VorwerkAccount};

/// Live clients of one entry
pub struct Connection {
    /// Account session, if the entry was created by logging in
    pub session: Option<Arc<CloudSession>>,
    /// Lists the account's devices each poll tick
    pub directory: Option<Arc<dyn DeviceDirectory>>,
    pub devices: Vec<(DeviceRecord, Arc<dyn DeviceApi>)>,
}

pub struct Connector {
    http: Client,
    vorwerk: VorwerkConfig,
    jdownloader: JDownloaderConfig,
    /// How long one robot state reply serves every entity of that robot
    state_ttl: Duration,
}

impl Connector {
    pub fn new(config: &Config) -> Result<Self, RemoteError> {
        let http = http_client(Duration::from_secs(config.polling.request_timeout_secs))?;
        Ok(Self {
            http,
            vorwerk: config.vorwerk.clone(),
            jdownloader: config.jdownloader.clone(),
            state_ttl: Duration::from_secs((config.polling.scan_interval_secs / 2).max(1)),
        })
    }

    pub fn vorwerk_session(&self) -> Result<Arc<CloudSession>, RemoteError> {
        let refresher = Auth0Refresher::new(&self.vorwerk.auth_url, &self.vorwerk.client_id)?;
        let session = CloudSession::new(self.http.clone(), &self.vorwerk.beehive_url, "Auth0Bearer")?
            .with_refresher(Arc::new(refresher));
        Ok(Arc::new(session))
    }

    /// Fresh account client for a registration flow
    pub fn vorwerk_account(&self) -> Result<VorwerkAccount, RemoteError> {
        VorwerkAccount::new(
            self.vorwerk_session()?,
            &self.vorwerk.auth_url,
            &self.vorwerk.client_id,
        )
    }

    pub fn jdownloader_session(&self) -> Result<Arc<CloudSession>, RemoteError> {
        let session = CloudSession::new(self.http.clone(), &self.jdownloader.api_url, "Bearer")?
            .with_refresher(Arc::new(JdReconnect::new(&self.jdownloader.api_url)));
        Ok(Arc::new(session))
    }

    pub fn jdownloader_account(&self) -> Result<JdAccount, RemoteError> {
        Ok(JdAccount::new(self.jdownloader_session()?, &self.jdownloader.app_key))
    }

    /// Restore the stored token and wrap every device in its client
    pub async fn connect(&self, entry: &ConfigEntry) -> Result<Connection, RemoteError> {
        match entry.integration {
            Integration::Vorwerk => self.connect_vorwerk(entry).await,
            Integration::JDownloader => self.connect_jdownloader(entry).await,
        }
    }

    async fn connect_vorwerk(&self, entry: &ConfigEntry) -> Result<Connection, RemoteError> {
        let session = match &entry.account.token {
            Some(token) => {
                let session = self.vorwerk_session()?;
                session.set_token(token.clone()).await;
                Some(session)
            }
            None => None,
        };

        let mut devices: Vec<(DeviceRecord, Arc<dyn DeviceApi>)> = Vec::new();
        for record in &entry.account.devices {
            match RobotClient::new(self.http.clone(), record) {
                Ok(robot) => {
                    let api: Arc<dyn DeviceApi> =
                        Arc::new(SharedQuery::new(Arc::new(robot), CMD_GET_ROBOT_STATE, self.state_ttl));
                    devices.push((record.clone(), api));
                }
                Err(e) => tracing::warn!("[Vorwerk] Skipping robot {}: {}", record.name, e),
            }
        }

        Ok(Connection {
            session,
            directory: None,
            devices,
        })
    }

    async fn connect_jdownloader(&self, entry: &ConfigEntry) -> Result<Connection, RemoteError> {
        let session = self.jdownloader_session()?;
        let token = entry
            .account
            .token
            .clone()
            .ok_or_else(|| RemoteError::Auth(format!("Entry {} has no session token", entry.title)))?;
        session.set_token(token).await;
        let directory: Arc<dyn DeviceDirectory> =
            Arc::new(JdAccount::new(session.clone(), &self.jdownloader.app_key));

        let devices = entry
            .account
            .devices
            .iter()
            .map(|record| {
                let api: Arc<dyn DeviceApi> = Arc::new(JdDevice::new(session.clone(), &record.serial));
                (record.clone(), api)
            })
            .collect();

        Ok(Connection {
            session: Some(session),
            directory: Some(directory),
            devices,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, Token};

    fn entry(integration: Integration, token: Option<Token>, devices: Vec<DeviceRecord>) -> ConfigEntry {
        ConfigEntry::new(
            integration,
            "test",
            "test",
            Account {
                identifier: None,
                token,
                devices,
            },
        )
    }

    #[tokio::test]
    async fn test_robots_without_secret_are_skipped() {
        let connector = Connector::new(&Config::default()).unwrap();
        let mut with_secret = DeviceRecord::new("Kitchen", "S1");
        with_secret.secret = Some("abcd".into());

        let conn = connector
            .connect(&entry(
                Integration::Vorwerk,
                None,
                vec![with_secret, DeviceRecord::new("Hall", "S2")],
            ))
            .await
            .unwrap();

        assert!(conn.session.is_none());
        assert!(conn.directory.is_none());
        assert_eq!(conn.devices.len(), 1);
        assert_eq!(conn.devices[0].0.serial, "S1");
    }

    #[tokio::test]
    async fn test_jdownloader_restores_token() {
        let connector = Connector::new(&Config::default()).unwrap();
        let conn = connector
            .connect(&entry(
                Integration::JDownloader,
                Some(Token::new("session")),
                vec![DeviceRecord::new("Office", "abc")],
            ))
            .await
            .unwrap();

        let session = conn.session.unwrap();
        assert_eq!(session.token().await, Some(Token::new("session")));
        assert!(conn.directory.is_some());
        assert_eq!(conn.devices.len(), 1);
    }

    #[tokio::test]
    async fn test_jdownloader_without_token_fails() {
        let connector = Connector::new(&Config::default()).unwrap();
        let result = connector
            .connect(&entry(Integration::JDownloader, None, vec![]))
            .await;
        assert!(matches!(result, Err(RemoteError::Auth(_))));
    }
}
