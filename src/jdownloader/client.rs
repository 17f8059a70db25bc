//! MyJDownloader API client
//!
//! Account calls go to `/my/...`; device calls are routed through the cloud
//! as `/t_{device_id}{operation}` with `{"params": [...]}` and answer
//! `{"data": ...}`.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::entity::{DeviceApi, DeviceDirectory};
use crate::error::RemoteError;
use crate::flow::PasswordBackend;
use crate::models::{DeviceRecord, Token};
use crate::session::{CloudSession, TokenRefresher};

#[derive(Debug, Deserialize)]
struct ConnectResponse {
    sessiontoken: String,
    #[serde(default)]
    regaintoken: Option<String>,
}

impl From<ConnectResponse> for Token {
    fn from(resp: ConnectResponse) -> Self {
        Token {
            access_token: resp.sessiontoken,
            id_token: None,
            refresh_token: resp.regaintoken,
            expires_at: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeviceList {
    #[serde(default)]
    list: Vec<DeviceRecord>,
}

/// Account-level MyJDownloader client
pub struct JdAccount {
    session: Arc<CloudSession>,
    app_key: String,
}

impl JdAccount {
    pub fn new(session: Arc<CloudSession>, app_key: &str) -> Self {
        Self {
            session,
            app_key: app_key.to_string(),
        }
    }

    pub async fn list_devices(&self) -> Result<Vec<DeviceRecord>, RemoteError> {
        let value = self.session.request("/my/listdevices").await?;
        let list: DeviceList = serde_json::from_value(value)
            .map_err(|e| RemoteError::Malformed(format!("Device list: {}", e)))?;
        Ok(list.list)
    }
}

#[async_trait]
impl PasswordBackend for JdAccount {
    async fn login(&self, identifier: &str, password: &str) -> Result<Token, RemoteError> {
        let body = json!({
            "email": identifier.to_lowercase(),
            "password": password,
            "appkey": self.app_key,
        });
        let value = self
            .session
            .post_anonymous(self.session.url("/my/connect")?, &body)
            .await?;
        let resp: ConnectResponse = serde_json::from_value(value)
            .map_err(|e| RemoteError::Malformed(format!("Connect response: {}", e)))?;

        let token = Token::from(resp);
        self.session.set_token(token.clone()).await;
        tracing::info!("[JDownloader] Connected as {}", identifier);
        Ok(token)
    }

    async fn devices(&self) -> Result<Vec<DeviceRecord>, RemoteError> {
        self.list_devices().await
    }
}

#[async_trait]
impl DeviceDirectory for JdAccount {
    async fn list(&self) -> Result<Vec<DeviceRecord>, RemoteError> {
        self.list_devices().await
    }

    fn client(&self, serial: &str) -> Arc<dyn DeviceApi> {
        Arc::new(JdDevice::new(self.session.clone(), serial))
    }
}

/// One JDownloader instance behind the account session
pub struct JdDevice {
    session: Arc<CloudSession>,
    device_id: String,
}

impl JdDevice {
    pub fn new(session: Arc<CloudSession>, device_id: &str) -> Self {
        Self {
            session,
            device_id: device_id.to_string(),
        }
    }
}

#[async_trait]
impl DeviceApi for JdDevice {
    async fn call(&self, operation: &str, args: &[Value]) -> Result<Value, RemoteError> {
        let path = format!("/t_{}{}", self.device_id, operation);
        let body = json!({ "url": operation, "params": args, "apiVer": 1 });
        let reply = self.session.post(&path, &body).await?;
        Ok(reply.get("data").cloned().unwrap_or(Value::Null))
    }
}

/// Exchanges the regain token for a new session token
pub struct JdReconnect {
    api_url: String,
}

impl JdReconnect {
    pub fn new(api_url: &str) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TokenRefresher for JdReconnect {
    async fn refresh(&self, http: &Client, current: &Token) -> Result<Token, RemoteError> {
        let regaintoken = current
            .refresh_token
            .as_deref()
            .ok_or_else(|| RemoteError::Auth("No regain token".to_string()))?;

        let resp = http
            .get(format!("{}/my/reconnect", self.api_url))
            .query(&[
                ("sessiontoken", current.access_token.as_str()),
                ("regaintoken", regaintoken),
            ])
            .send()
            .await?
            .error_for_status()?;

        let resp: ConnectResponse = resp.json().await?;
        Ok(Token::from(resp))
    }
}
