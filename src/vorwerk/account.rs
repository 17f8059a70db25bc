//! Vorwerk account API client (auth0 passwordless + beehive)

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use url::Url;

use crate::error::RemoteError;
use crate::flow::AccountBackend;
use crate::models::{DeviceRecord, Token};
use crate::session::{CloudSession, TokenRefresher};

const SCOPE: &str = "openid email profile read:current_user offline_access";
const OTP_GRANT: &str = "http://auth0.com/oauth/grant-type/passwordless/otp";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_token(self, previous_refresh: Option<&str>) -> Token {
        Token {
            access_token: self.access_token,
            id_token: self.id_token,
            refresh_token: self
                .refresh_token
                .or_else(|| previous_refresh.map(str::to_string)),
            expires_at: self
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RemoteRobot {
    name: String,
    serial: String,
    secret_key: String,
    #[serde(default)]
    traits: Vec<String>,
    #[serde(default)]
    nucleo_url: Option<String>,
    #[serde(default)]
    model: Option<String>,
}

impl From<RemoteRobot> for DeviceRecord {
    fn from(robot: RemoteRobot) -> Self {
        DeviceRecord {
            name: robot.name,
            serial: robot.serial,
            secret: Some(robot.secret_key),
            traits: robot.traits,
            endpoint: robot.nucleo_url,
            device_type: robot.model,
            persistent_maps: None,
        }
    }
}

/// Account-level Vorwerk client; owns the beehive session
pub struct VorwerkAccount {
    session: Arc<CloudSession>,
    auth_url: Url,
    client_id: String,
}

impl VorwerkAccount {
    pub fn new(
        session: Arc<CloudSession>,
        auth_url: &str,
        client_id: &str,
    ) -> Result<Self, RemoteError> {
        let auth_url = Url::parse(auth_url)
            .map_err(|e| RemoteError::Transport(format!("Invalid auth URL {}: {}", auth_url, e)))?;
        Ok(Self {
            session,
            auth_url,
            client_id: client_id.to_string(),
        })
    }

    fn auth_endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        self.auth_url
            .join(path)
            .map_err(|e| RemoteError::Transport(format!("Invalid auth path {}: {}", path, e)))
    }
}

#[async_trait]
impl AccountBackend for VorwerkAccount {
    async fn send_code(&self, identifier: &str) -> Result<(), RemoteError> {
        let body = json!({
            "client_id": self.client_id,
            "connection": "email",
            "email": identifier,
            "send": "code",
        });
        self.session
            .post_anonymous(self.auth_endpoint("passwordless/start")?, &body)
            .await?;
        tracing::info!("[Vorwerk] Sent one-time code to {}", identifier);
        Ok(())
    }

    async fn exchange_code(&self, identifier: &str, code: &str) -> Result<Token, RemoteError> {
        let body = json!({
            "prompt": "login",
            "grant_type": OTP_GRANT,
            "scope": SCOPE,
            "locale": "en",
            "otp": code,
            "source": "vorwerk_auth0",
            "platform": "ios",
            "audience": self.auth_endpoint("userinfo")?.as_str(),
            "username": identifier,
            "client_id": self.client_id,
            "realm": "email",
            "country_code": "DE",
        });

        let value = self
            .session
            .post_anonymous(self.auth_endpoint("oauth/token")?, &body)
            .await?;
        let response: TokenResponse = serde_json::from_value(value)
            .map_err(|e| RemoteError::Malformed(format!("Token response: {}", e)))?;

        let token = response.into_token(None);
        self.session.set_token(token.clone()).await;
        Ok(token)
    }

    async fn devices(&self) -> Result<Vec<DeviceRecord>, RemoteError> {
        let value = self.session.request("users/me/robots").await?;
        let robots: Vec<RemoteRobot> = serde_json::from_value(value)
            .map_err(|e| RemoteError::Malformed(format!("Robot list: {}", e)))?;
        Ok(robots.into_iter().map(DeviceRecord::from).collect())
    }

    async fn persistent_maps(
        &self,
        devices: &[DeviceRecord],
    ) -> Result<HashMap<String, Vec<Map<String, Value>>>, RemoteError> {
        let mut maps = HashMap::new();
        for device in devices {
            let value = self
                .session
                .request(&format!("users/me/robots/{}/persistent_maps", device.serial))
                .await?;
            let entries: Vec<Map<String, Value>> = serde_json::from_value(value)
                .map_err(|e| RemoteError::Malformed(format!("Persistent maps: {}", e)))?;
            tracing::debug!(
                "[Vorwerk] Found {} persistent maps for {}",
                entries.len(),
                device.serial
            );
            maps.insert(device.serial.clone(), entries);
        }
        Ok(maps)
    }

    async fn map_image(&self, url: &str) -> Result<Vec<u8>, RemoteError> {
        self.session.download(url).await
    }
}

/// Refresh grant against the auth0 tenant
pub struct Auth0Refresher {
    token_url: Url,
    client_id: String,
}

impl Auth0Refresher {
    pub fn new(auth_url: &str, client_id: &str) -> Result<Self, RemoteError> {
        let token_url = Url::parse(auth_url)
            .and_then(|u| u.join("oauth/token"))
            .map_err(|e| RemoteError::Transport(format!("Invalid auth URL {}: {}", auth_url, e)))?;
        Ok(Self {
            token_url,
            client_id: client_id.to_string(),
        })
    }
}

#[async_trait]
impl TokenRefresher for Auth0Refresher {
    async fn refresh(&self, http: &Client, current: &Token) -> Result<Token, RemoteError> {
        let refresh_token = current
            .refresh_token
            .as_deref()
            .ok_or_else(|| RemoteError::Auth("No refresh token".to_string()))?;

        let resp = http
            .post(self.token_url.clone())
            .json(&json!({
                "grant_type": "refresh_token",
                "client_id": self.client_id,
                "refresh_token": refresh_token,
            }))
            .send()
            .await?
            .error_for_status()?;

        let response: TokenResponse = resp.json().await?;
        Ok(response.into_token(Some(refresh_token)))
    }
}
