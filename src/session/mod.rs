//! Authenticated JSON session against a vendor cloud
//!
//! One `CloudSession` holds exactly one token. Every entity of an account
//! shares the session; refreshes are serialized by `refresh_gate` so a burst
//! of 401s from concurrently polled entities results in a single refresh.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method, Response, StatusCode};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use url::Url;

use crate::error::RemoteError;
use crate::models::Token;

/// Vendor specific way of getting a fresh token from a stale one
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, http: &Client, current: &Token) -> Result<Token, RemoteError>;
}

pub struct CloudSession {
    http: Client,
    base_url: Url,
    auth_scheme: &'static str,
    token: RwLock<Option<Token>>,
    refresh_gate: Mutex<()>,
    refresher: Option<Arc<dyn TokenRefresher>>,
}

/// Shared HTTP client for all sessions
pub fn http_client(timeout: Duration) -> Result<Client, RemoteError> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| RemoteError::Transport(format!("HTTP client: {}", e)))
}

impl CloudSession {
    pub fn new(http: Client, base_url: &str, auth_scheme: &'static str) -> Result<Self, RemoteError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RemoteError::Transport(format!("Invalid base URL {}: {}", base_url, e)))?;

        Ok(Self {
            http,
            base_url,
            auth_scheme,
            token: RwLock::new(None),
            refresh_gate: Mutex::new(()),
            refresher: None,
        })
    }

    pub fn with_refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub async fn token(&self) -> Option<Token> {
        self.token.read().await.clone()
    }

    pub async fn set_token(&self, token: Token) {
        *self.token.write().await = Some(token);
    }

    pub fn url(&self, path: &str) -> Result<Url, RemoteError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| RemoteError::Transport(format!("Invalid path {}: {}", path, e)))
    }

    /// Authenticated GET returning JSON
    pub async fn request(&self, path: &str) -> Result<Value, RemoteError> {
        self.send_authed(Method::GET, path, None).await
    }

    /// Authenticated POST returning JSON
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, RemoteError> {
        self.send_authed(Method::POST, path, Some(body)).await
    }

    /// Unauthenticated POST, used by login endpoints
    pub async fn post_anonymous(&self, url: Url, body: &Value) -> Result<Value, RemoteError> {
        self.execute(Method::POST, url, Some(body), None).await
    }

    /// Fetch raw bytes from an absolute (usually pre-signed) URL
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, RemoteError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(format!("Download failed: {}", e)))?;
        let resp = check_status(resp).await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| RemoteError::Transport(format!("Download read failed: {}", e)))?;
        Ok(bytes.to_vec())
    }

    async fn send_authed(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, RemoteError> {
        let url = self.url(path)?;
        let bearer = self
            .token()
            .await
            .map(|t| t.bearer().to_string())
            .ok_or_else(|| RemoteError::Auth("Not logged in".to_string()))?;

        match self
            .execute(method.clone(), url.clone(), body, Some(&bearer))
            .await
        {
            Err(RemoteError::Auth(reason)) => {
                if !self.refresh(&bearer).await? {
                    return Err(RemoteError::Auth(reason));
                }
                let bearer = self
                    .token()
                    .await
                    .map(|t| t.bearer().to_string())
                    .ok_or_else(|| RemoteError::Auth("Not logged in".to_string()))?;
                self.execute(method, url, body, Some(&bearer)).await
            }
            other => other,
        }
    }

    /// Refresh the token unless another caller already did.
    ///
    /// Returns whether a usable new token is in place.
    async fn refresh(&self, stale_bearer: &str) -> Result<bool, RemoteError> {
        let Some(refresher) = &self.refresher else {
            return Ok(false);
        };

        let _gate = self.refresh_gate.lock().await;

        let Some(current) = self.token().await else {
            return Ok(false);
        };
        if current.bearer() != stale_bearer {
            return Ok(true);
        }
        if current.refresh_token.is_none() {
            return Ok(false);
        }

        let fresh = refresher.refresh(&self.http, &current).await?;
        self.set_token(fresh).await;
        tracing::info!("[Session] Token refreshed for {}", self.base_url);
        Ok(true)
    }

    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        bearer: Option<&str>,
    ) -> Result<Value, RemoteError> {
        let mut req = self.http.request(method, url.clone());
        if let Some(bearer) = bearer {
            req = req.header(
                header::AUTHORIZATION,
                format!("{} {}", self.auth_scheme, bearer),
            );
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| RemoteError::Transport(format!("Request to {} failed: {}", url, e)))?;
        let resp = check_status(resp).await?;
        read_json(resp).await
    }
}

/// Map an HTTP status to the error taxonomy; `None` means success
pub fn classify_status(status: StatusCode) -> Option<RemoteError> {
    if status.is_success() {
        None
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Some(RemoteError::Auth(format!("HTTP {}", status)))
    } else {
        Some(RemoteError::Transport(format!("HTTP {}", status)))
    }
}

async fn check_status(resp: Response) -> Result<Response, RemoteError> {
    match classify_status(resp.status()) {
        None => Ok(resp),
        Some(RemoteError::Auth(reason)) => {
            let body = resp.text().await.unwrap_or_default();
            Err(RemoteError::Auth(format!("{} {}", reason, body.trim())))
        }
        Some(e) => Err(e),
    }
}

async fn read_json(resp: Response) -> Result<Value, RemoteError> {
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| RemoteError::Transport(format!("Response read failed: {}", e)))?;
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(|e| RemoteError::Malformed(e.to_string()))
}
