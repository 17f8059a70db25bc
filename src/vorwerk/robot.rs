//! Per-robot message endpoint ("nucleo")
//!
//! Every message is signed with the robot secret:
//! `HMAC-SHA256(secret, lower(serial) + "\n" + date + "\n" + body)`.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{header, Client};
use serde_json::{json, Value};
use sha2::Sha256;
use url::Url;

use crate::config::default_robot_endpoint;
use crate::entity::DeviceApi;
use crate::error::RemoteError;
use crate::models::DeviceRecord;

type HmacSha256 = Hmac<Sha256>;

const NUCLEO_ACCEPT: &str = "application/vnd.neato.nucleo.v1";

pub const CMD_GET_ROBOT_STATE: &str = "getRobotState";
pub const CMD_ENABLE_SCHEDULE: &str = "enableSchedule";
pub const CMD_DISABLE_SCHEDULE: &str = "disableSchedule";

pub fn sign(serial: &str, secret: &str, date: &str, body: &str) -> Result<String, RemoteError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| RemoteError::Auth("Invalid robot secret".to_string()))?;
    mac.update(format!("{}\n{}\n{}", serial.to_lowercase(), date, body).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub struct RobotClient {
    http: Client,
    name: String,
    serial: String,
    secret: String,
    endpoint: Url,
}

impl RobotClient {
    pub fn new(http: Client, record: &DeviceRecord) -> Result<Self, RemoteError> {
        let secret = record
            .secret
            .clone()
            .ok_or_else(|| RemoteError::Auth(format!("Robot {} has no secret", record.serial)))?;
        let endpoint = record.endpoint.clone().unwrap_or_else(default_robot_endpoint);
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| RemoteError::Transport(format!("Invalid endpoint {}: {}", endpoint, e)))?;

        Ok(Self {
            http,
            name: record.name.clone(),
            serial: record.serial.clone(),
            secret,
            endpoint,
        })
    }

    fn messages_url(&self) -> Result<Url, RemoteError> {
        self.endpoint
            .join(&format!("vendors/vorwerk/robots/{}/messages", self.serial))
            .map_err(|e| RemoteError::Transport(format!("Invalid robot URL: {}", e)))
    }

    /// Send one command to the robot and return its JSON reply
    pub async fn message(&self, cmd: &str, params: Option<Value>) -> Result<Value, RemoteError> {
        let mut payload = json!({ "reqId": "1", "cmd": cmd });
        if let Some(params) = params {
            payload["params"] = params;
        }
        let body = payload.to_string();
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let signature = sign(&self.serial, &self.secret, &date, &body)?;

        let resp = self
            .http
            .post(self.messages_url()?)
            .header(header::ACCEPT, NUCLEO_ACCEPT)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::DATE, &date)
            .header(header::AUTHORIZATION, format!("NEATOAPP {}", signature))
            .body(body)
            .send()
            .await
            .map_err(|e| {
                RemoteError::Transport(format!("Robot {} unreachable: {}", self.name, e))
            })?;

        if let Some(err) = crate::session::classify_status(resp.status()) {
            return Err(err);
        }

        let reply: Value = resp
            .json()
            .await
            .map_err(|e| RemoteError::Malformed(format!("Robot {} reply: {}", self.name, e)))?;

        match reply.get("result").and_then(Value::as_str) {
            Some("ok") | None => Ok(reply),
            Some(other) => Err(RemoteError::Transport(format!(
                "Robot {} rejected {}: {}",
                self.name, cmd, other
            ))),
        }
    }
}

#[async_trait]
impl DeviceApi for RobotClient {
    async fn call(&self, operation: &str, args: &[Value]) -> Result<Value, RemoteError> {
        self.message(operation, args.first().cloned()).await
    }
}
